//! Agent side of an ACP connection

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task::JoinHandle;

use super::schema::{
    AuthenticateRequest, CancelNotification, InitializeRequest, InitializeResponse,
    LoadSessionRequest, NewSessionRequest, NewSessionResponse, PromptRequest, PromptResponse,
    ReadTextFileRequest, ReadTextFileResponse, RequestPermissionRequest,
    RequestPermissionResponse, SessionNotification, WriteTextFileRequest, methods,
};
use super::validation::{parse_params, parse_response};
use crate::error::{BridgeError, BridgeResult};
use crate::protocol::{Connection, HandlerError, MethodHandler, RpcError};

/// Operations the host may invoke on the agent
#[async_trait]
pub trait Agent: Send + Sync {
    async fn initialize(&self, params: InitializeRequest) -> BridgeResult<InitializeResponse>;

    async fn authenticate(&self, params: AuthenticateRequest) -> BridgeResult<()>;

    async fn new_session(&self, params: NewSessionRequest) -> BridgeResult<NewSessionResponse>;

    /// Whether `session/load` is routed to [`Agent::load_session`]
    fn supports_load_session(&self) -> bool {
        false
    }

    async fn load_session(&self, _params: LoadSessionRequest) -> BridgeResult<()> {
        Err(RpcError::method_not_found(Some(methods::SESSION_LOAD)).into())
    }

    async fn prompt(&self, params: PromptRequest) -> BridgeResult<PromptResponse>;

    async fn cancel(&self, params: CancelNotification) -> BridgeResult<()>;
}

/// Operations the agent may invoke on the host
#[async_trait]
pub trait Client: Send + Sync {
    async fn session_update(&self, params: SessionNotification) -> BridgeResult<()>;

    async fn request_permission(
        &self,
        params: RequestPermissionRequest,
    ) -> BridgeResult<RequestPermissionResponse>;

    async fn read_text_file(&self, params: ReadTextFileRequest) -> BridgeResult<ReadTextFileResponse>;

    async fn write_text_file(&self, params: WriteTextFileRequest) -> BridgeResult<()>;
}

/// [`Client`] backed by a live connection to the host
#[derive(Debug, Clone)]
pub struct ClientHandle {
    connection: Connection,
}

impl ClientHandle {
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }

    async fn request<P: Serialize>(&self, method: &str, params: &P) -> BridgeResult<Value> {
        let params = serde_json::to_value(params)?;
        self.connection.send_request(method, Some(params)).await
    }
}

#[async_trait]
impl Client for ClientHandle {
    async fn session_update(&self, params: SessionNotification) -> BridgeResult<()> {
        let params = serde_json::to_value(&params)?;
        self.connection
            .send_notification(methods::SESSION_UPDATE, Some(params))
            .await
    }

    async fn request_permission(
        &self,
        params: RequestPermissionRequest,
    ) -> BridgeResult<RequestPermissionResponse> {
        let result = self
            .request(methods::SESSION_REQUEST_PERMISSION, &params)
            .await?;
        parse_response(methods::SESSION_REQUEST_PERMISSION, result)
    }

    async fn read_text_file(&self, params: ReadTextFileRequest) -> BridgeResult<ReadTextFileResponse> {
        let result = self.request(methods::FS_READ_TEXT_FILE, &params).await?;
        parse_response(methods::FS_READ_TEXT_FILE, result)
    }

    async fn write_text_file(&self, params: WriteTextFileRequest) -> BridgeResult<()> {
        let result = self.request(methods::FS_WRITE_TEXT_FILE, &params).await?;
        if !result.is_null() {
            return Err(BridgeError::invalid_input_field(
                format!("expected null response, got {}", result),
                methods::FS_WRITE_TEXT_FILE,
            ));
        }
        Ok(())
    }
}

/// Routes inbound ACP methods to an [`Agent`]
struct AgentDispatcher<A: ?Sized> {
    agent: Arc<A>,
}

fn to_result<T: Serialize>(value: T) -> Result<Value, HandlerError> {
    serde_json::to_value(value).map_err(|e| HandlerError::Internal(e.to_string()))
}

#[async_trait]
impl<A> MethodHandler for AgentDispatcher<A>
where
    A: Agent + ?Sized + 'static,
{
    async fn handle(&self, method: &str, params: Option<Value>) -> Result<Value, HandlerError> {
        match method {
            methods::INITIALIZE => {
                let params = parse_params(method, params)?;
                to_result(self.agent.initialize(params).await?)
            }
            methods::AUTHENTICATE => {
                let params = parse_params(method, params)?;
                self.agent.authenticate(params).await?;
                Ok(Value::Null)
            }
            methods::SESSION_NEW => {
                let params = parse_params(method, params)?;
                to_result(self.agent.new_session(params).await?)
            }
            methods::SESSION_LOAD => {
                if !self.agent.supports_load_session() {
                    return Err(RpcError::method_not_found(Some(method)).into());
                }
                let params = parse_params(method, params)?;
                self.agent.load_session(params).await?;
                Ok(Value::Null)
            }
            methods::SESSION_PROMPT => {
                let params = parse_params(method, params)?;
                to_result(self.agent.prompt(params).await?)
            }
            methods::SESSION_CANCEL => {
                let params = parse_params(method, params)?;
                self.agent.cancel(params).await?;
                Ok(Value::Null)
            }
            other => Err(RpcError::method_not_found(Some(other)).into()),
        }
    }
}

/// An [`Agent`] bound to a pair of byte streams
pub struct AgentSideConnection {
    client: ClientHandle,
    io: JoinHandle<()>,
}

impl AgentSideConnection {
    /// Wire up `to_agent`'s agent to the host on `writer`/`reader`
    ///
    /// `to_agent` receives the handle the agent uses to reach the host.
    pub fn new<A, F, W, R>(to_agent: F, writer: W, reader: R) -> (Arc<A>, Self)
    where
        A: Agent + 'static,
        F: FnOnce(ClientHandle) -> A,
        W: AsyncWrite + Unpin + Send + 'static,
        R: AsyncRead + Unpin + Send + 'static,
    {
        let connection = Connection::new(writer);
        let client = ClientHandle::new(connection.clone());
        let agent = Arc::new(to_agent(client.clone()));

        let dispatcher = Arc::new(AgentDispatcher {
            agent: Arc::clone(&agent),
        });
        let io = connection.listen(reader, dispatcher);

        (agent, Self { client, io })
    }

    pub fn client(&self) -> &ClientHandle {
        &self.client
    }

    /// Wait until the host closes its end of the stream
    pub async fn closed(self) -> BridgeResult<()> {
        self.io
            .await
            .map_err(|e| BridgeError::transport(format!("receive loop failed: {}", e)))
    }
}
