//! Request dispatch.
//!
//! The dispatch table maps api keys to message handlers. It is built once at
//! server construction and never mutated, so lookups from concurrent
//! connection tasks need no locking.

use crate::error::ServerError;
use kavka_protocol::{ApiKey, Request, Response, ResponseBody};
use std::collections::HashMap;
use std::sync::Arc;

/// A message handler for one api key.
///
/// Handlers are shared across all connections and must not block: they are
/// expected to be in-memory responders.
pub trait MessageHandler: Send + Sync {
    /// The api key this handler serves.
    fn api_key(&self) -> ApiKey;

    /// Whether this handler is responsible for the given request.
    fn should_handle(&self, request: &Request) -> bool {
        request.header.api_key == self.api_key()
    }

    /// Produces the encoded response body for a request.
    fn handle(&self, request: &Request) -> Result<ResponseBody, ServerError>;
}

/// Routes decoded requests to the handler registered for their api key.
pub struct Dispatcher {
    table: HashMap<i16, Arc<dyn MessageHandler>>,
}

impl Dispatcher {
    /// Builds the dispatch table from a list of handlers.
    ///
    /// Later handlers win on duplicate api keys; registering duplicates is a
    /// construction bug, so it is logged.
    pub fn new(handlers: Vec<Arc<dyn MessageHandler>>) -> Self {
        let mut table: HashMap<i16, Arc<dyn MessageHandler>> = HashMap::new();
        for handler in handlers {
            let key = i16::from(handler.api_key());
            if table.insert(key, handler).is_some() {
                tracing::warn!("Duplicate handler registered for api key {}", key);
            }
        }
        Self { table }
    }

    /// Looks up and invokes the handler for a request, wrapping the result
    /// with the request's correlation id.
    pub fn dispatch(&self, request: &Request) -> Result<Response, ServerError> {
        let key = i16::from(request.header.api_key);
        let handler = self
            .table
            .get(&key)
            .ok_or(ServerError::UnsupportedApiKey(key))?;

        let body = handler.handle(request)?;
        Ok(Response::new(request.header.correlation_id, body))
    }

    /// Api keys with a registered handler, in no particular order.
    pub fn registered_keys(&self) -> Vec<i16> {
        self.table.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use kavka_protocol::{RequestBody, RequestHeader};

    struct EchoKeyHandler {
        key: ApiKey,
    }

    impl MessageHandler for EchoKeyHandler {
        fn api_key(&self) -> ApiKey {
            self.key
        }

        fn handle(&self, _request: &Request) -> Result<ResponseBody, ServerError> {
            let key: i16 = self.key.into();
            Ok(ResponseBody::standard(Bytes::from(key.to_be_bytes().to_vec())))
        }
    }

    fn request_for(key: ApiKey, correlation_id: i32) -> Request {
        Request {
            header: RequestHeader {
                api_key: key,
                api_version: 0,
                correlation_id,
                client_id: None,
            },
            body: RequestBody::Unknown(Bytes::new()),
        }
    }

    fn dispatcher_with(keys: &[ApiKey]) -> Dispatcher {
        Dispatcher::new(
            keys.iter()
                .map(|&key| Arc::new(EchoKeyHandler { key }) as Arc<dyn MessageHandler>)
                .collect(),
        )
    }

    #[test]
    fn test_routes_to_matching_handler() {
        let dispatcher = dispatcher_with(&[ApiKey::ApiVersions, ApiKey::Metadata]);

        let response = dispatcher
            .dispatch(&request_for(ApiKey::Metadata, 9))
            .unwrap();
        assert_eq!(response.correlation_id, 9);

        // Body carries the handler's own api key: proves no cross-routing
        let frame = response.encode_frame().unwrap();
        assert_eq!(&frame[8..], &3i16.to_be_bytes());
    }

    #[test]
    fn test_unregistered_key_fails() {
        let dispatcher = dispatcher_with(&[ApiKey::ApiVersions]);
        let result = dispatcher.dispatch(&request_for(ApiKey::Produce, 1));
        assert!(matches!(result, Err(ServerError::UnsupportedApiKey(0))));
    }

    #[test]
    fn test_correlation_id_copied() {
        let dispatcher = dispatcher_with(&[ApiKey::ApiVersions]);
        for id in [0, 1, -1, i32::MAX] {
            let response = dispatcher
                .dispatch(&request_for(ApiKey::ApiVersions, id))
                .unwrap();
            assert_eq!(response.correlation_id, id);
        }
    }

    #[test]
    fn test_should_handle_default() {
        let handler = EchoKeyHandler {
            key: ApiKey::ApiVersions,
        };
        assert!(handler.should_handle(&request_for(ApiKey::ApiVersions, 1)));
        assert!(!handler.should_handle(&request_for(ApiKey::Produce, 1)));
    }

    #[test]
    fn test_registered_keys() {
        let dispatcher = dispatcher_with(&[ApiKey::ApiVersions, ApiKey::Fetch]);
        let mut keys = dispatcher.registered_keys();
        keys.sort_unstable();
        assert_eq!(keys, vec![1, 18]);
    }
}
