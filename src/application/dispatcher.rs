// Message dispatcher - Routes live channel frames to typed handlers
use crate::domain::messages::{Envelope, INBOUND_TYPES, InboundPayload};
use crate::error::{DecodeError, RegistrationError};
use serde_json::Value;
use std::collections::HashMap;

type Handler = Box<dyn Fn(Value) -> Result<(), DecodeError> + Send + Sync>;

/// Outcome of dispatching a single frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Handled(&'static str),
    /// Unrecognised or unsubscribed type tag. Never an error.
    Ignored(String),
}

#[derive(Default)]
pub struct MessageDispatcher {
    handlers: HashMap<&'static str, Handler>,
}

impl MessageDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `handler` to the payload type `M`. Each type tag takes
    /// exactly one handler.
    pub fn register<M, F>(&mut self, handler: F) -> Result<(), RegistrationError>
    where
        M: InboundPayload,
        F: Fn(M) + Send + Sync + 'static,
    {
        if !INBOUND_TYPES.contains(&M::TYPE) {
            return Err(RegistrationError::NotInbound(M::TYPE));
        }
        if self.handlers.contains_key(M::TYPE) {
            return Err(RegistrationError::Duplicate(M::TYPE));
        }

        let boxed: Handler = Box::new(move |data| {
            let payload = serde_json::from_value::<M>(data).map_err(|source| {
                DecodeError::Payload {
                    message_type: M::TYPE,
                    source,
                }
            })?;
            handler(payload);
            Ok(())
        });
        self.handlers.insert(M::TYPE, boxed);
        Ok(())
    }

    pub fn is_registered(&self, message_type: &str) -> bool {
        self.handlers.contains_key(message_type)
    }

    /// Decode a text frame and hand its payload to the matching handler.
    pub fn dispatch(&self, frame: &str) -> Result<Dispatch, DecodeError> {
        let envelope: Envelope = serde_json::from_str(frame)?;

        match self.handlers.get_key_value(envelope.message_type.as_str()) {
            Some((&message_type, handler)) => {
                handler(envelope.data)?;
                Ok(Dispatch::Handled(message_type))
            }
            None => Ok(Dispatch::Ignored(envelope.message_type)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::messages::{DoorIndicator, Uptime};
    use serde::Deserialize;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_dispatches_typed_payload() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        let mut dispatcher = MessageDispatcher::new();
        dispatcher
            .register(move |door: DoorIndicator| sink.lock().unwrap().push(door))
            .unwrap();

        let outcome = dispatcher
            .dispatch(r#"{"type": "door_indicator", "data": "open"}"#)
            .unwrap();

        assert_eq!(outcome, Dispatch::Handled("door_indicator"));
        assert_eq!(*seen.lock().unwrap(), vec![DoorIndicator::Open]);
    }

    #[test]
    fn test_unknown_types_are_ignored() {
        let dispatcher = MessageDispatcher::new();
        let outcome = dispatcher
            .dispatch(r#"{"type": "firmware_update", "data": {"version": 4}}"#)
            .unwrap();
        assert_eq!(outcome, Dispatch::Ignored("firmware_update".to_string()));
    }

    #[test]
    fn test_malformed_frames_are_decode_errors() {
        let mut dispatcher = MessageDispatcher::new();
        dispatcher.register(|_: Uptime| {}).unwrap();

        assert!(matches!(dispatcher.dispatch("not json"), Err(DecodeError::Json(_))));
        assert!(matches!(
            dispatcher.dispatch(r#"{"type": "uptime", "data": {"uptime": "soon"}}"#),
            Err(DecodeError::Payload { message_type: "uptime", .. })
        ));
    }

    #[test]
    fn test_registration_is_validated() {
        #[derive(Deserialize)]
        struct Announce;
        impl InboundPayload for Announce {
            const TYPE: &'static str = "client_init";
        }

        let mut dispatcher = MessageDispatcher::new();
        dispatcher.register(|_: Uptime| {}).unwrap();

        assert_eq!(
            dispatcher.register(|_: Uptime| {}),
            Err(RegistrationError::Duplicate("uptime"))
        );
        assert_eq!(
            dispatcher.register(|_: Announce| {}),
            Err(RegistrationError::NotInbound("client_init"))
        );
        assert!(dispatcher.is_registered("uptime"));
        assert!(!dispatcher.is_registered("client_init"));
    }
}
