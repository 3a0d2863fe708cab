use std::fmt;

/// Identifier for one kind of event in a domain.
///
/// It's recommended to keep a single list of `EventId` constants visible to
/// the whole application so events stay documented in one place.
///
/// Ids `0` and `1` are reserved: [`EventId::NONE`] rejects dispatch and
/// [`EventId::ASYNC_ERROR`] carries processing errors to error subscribers.
/// Application events start at [`EventId::FIRST_APP_EVENT`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId(pub u32);

impl EventId {
    /// Reserved id used for detecting misuse; cannot be dispatched.
    pub const NONE: EventId = EventId(0);

    /// Reserved id used for transmitting processing errors.
    ///
    /// Subscribe with [`EventBus::register_error_handler`](crate::EventBus::register_error_handler)
    /// rather than registering for this id directly.
    pub const ASYNC_ERROR: EventId = EventId(1);

    /// First id available for application use.
    pub const FIRST_APP_EVENT: EventId = EventId(2);

    /// True for the reserved ids.
    pub fn is_reserved(self) -> bool {
        self.0 < Self::FIRST_APP_EVENT.0
    }
}

impl From<u32> for EventId {
    fn from(id: u32) -> Self {
        EventId(id)
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_ids() {
        assert_eq!(EventId::NONE, EventId(0));
        assert_eq!(EventId::ASYNC_ERROR, EventId(1));
        assert!(EventId::NONE.is_reserved());
        assert!(EventId::ASYNC_ERROR.is_reserved());
        assert!(!EventId::FIRST_APP_EVENT.is_reserved());
    }

    #[test]
    fn display_is_bare_number() {
        assert_eq!(EventId(42).to_string(), "42");
    }
}
