//! The local agent: inbound dispatch and outbound coordination calls.

use std::sync::Arc;
use std::time::Duration;

use agentnet_p2p::{
    AnnouncePayload, ChatRequest, ChatResponse, Dispatch, Envelope, ErrorPayload, MessageKind,
    Node, PeerId, RegisterPayload, Result as P2pResult,
};
use async_trait::async_trait;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::backend::CompletionBackend;
use crate::config::AgentConfig;
use crate::directory::{AgentDirectory, AgentRecord, AgentSummary};
use crate::error::{AgentError, Result};

/// Deadline for directed chat exchanges; completions can be slow.
const CHAT_TIMEOUT: Duration = Duration::from_secs(60);

/// Deadline for liveness probes.
const PING_TIMEOUT: Duration = Duration::from_secs(5);

/// The local agent.
///
/// Dispatches inbound protocol messages (registration, chat, ping,
/// announce) and exposes the outbound coordination calls the gateway
/// layer consumes. Installed as its node's [`Dispatch`] handler on
/// construction.
pub struct Agent {
    config: AgentConfig,
    node: Node,
    directory: AgentDirectory,
    backend: Arc<dyn CompletionBackend>,
}

impl Agent {
    /// Creates an agent over `node` and installs it as the node's
    /// dispatcher.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Config`] when the configuration is invalid.
    pub fn new(
        config: AgentConfig,
        node: Node,
        backend: Arc<dyn CompletionBackend>,
    ) -> Result<Arc<Self>> {
        config.validate().map_err(AgentError::Config)?;

        let agent = Arc::new(Self {
            config,
            node: node.clone(),
            directory: AgentDirectory::new(),
            backend,
        });
        node.set_dispatcher(agent.clone());
        Ok(agent)
    }

    /// The node this agent coordinates through.
    #[must_use]
    pub fn node(&self) -> &Node {
        &self.node
    }

    /// The directory of registered remote agents.
    #[must_use]
    pub fn directory(&self) -> &AgentDirectory {
        &self.directory
    }

    fn local_id(&self) -> PeerId {
        self.node.local_id().clone()
    }

    fn pong(&self) -> Envelope {
        Envelope::new(MessageKind::Pong, self.local_id())
    }

    /// Broadcasts this agent's registration to every connected peer.
    pub fn register_on_network(&self) -> Result<()> {
        let payload = RegisterPayload {
            agent_name: self.config.agent_name.clone(),
            endpoint: self.config.endpoint(),
            models: self.config.models.clone(),
        };
        let envelope =
            Envelope::new(MessageKind::Register, self.local_id()).with_payload(&payload)?;

        info!(name = %payload.agent_name, "broadcasting registration");
        self.node.broadcast(envelope);
        Ok(())
    }

    /// Broadcasts a resource advertisement.
    pub fn announce(&self, payload: &AnnouncePayload) -> Result<()> {
        info!(
            kind = %payload.kind,
            name = %payload.name,
            url = %payload.url,
            "broadcasting announcement"
        );
        let envelope =
            Envelope::new(MessageKind::Announce, self.local_id()).with_payload(payload)?;
        self.node.broadcast(envelope);
        Ok(())
    }

    /// Sends a chat-completion request to a specific agent and waits for
    /// its result.
    pub async fn chat_with(&self, peer: &PeerId, request: &ChatRequest) -> Result<ChatResponse> {
        let envelope = Envelope::new(MessageKind::Chat, self.local_id())
            .with_to(peer.clone())
            .with_request_id(Uuid::new_v4().to_string())
            .with_payload(request)?;

        let reply = self
            .node
            .send_and_await(peer, &envelope, CHAT_TIMEOUT)
            .await?
            .ok_or_else(|| AgentError::NoResponse(peer.clone()))?;

        match reply.kind {
            MessageKind::Complete => Ok(reply.payload_as::<ChatResponse>()?),
            MessageKind::Error => {
                let payload: ErrorPayload = reply.payload_as()?;
                Err(AgentError::Remote {
                    peer: peer.clone(),
                    message: payload.error,
                })
            }
            other => Err(AgentError::Remote {
                peer: peer.clone(),
                message: format!("unexpected reply kind {other:?}"),
            }),
        }
    }

    /// Probes a peer for liveness.
    pub async fn ping(&self, peer: &PeerId) -> Result<bool> {
        let envelope = Envelope::new(MessageKind::Ping, self.local_id());
        let reply = self.node.send_and_await(peer, &envelope, PING_TIMEOUT).await?;
        Ok(matches!(
            reply,
            Some(Envelope {
                kind: MessageKind::Pong,
                ..
            })
        ))
    }

    /// Lists every known peer merged with its registration record.
    pub fn list_agents(&self) -> Vec<AgentSummary> {
        self.node
            .registry()
            .peers()
            .into_iter()
            .map(|peer| {
                let record = self.directory.get(&peer.id);
                AgentSummary {
                    peer: peer.id,
                    connected: peer.connected,
                    name: record.as_ref().map(|r| r.name.clone()),
                    endpoint: record.as_ref().map(|r| r.endpoint.clone()),
                    models: record.map(|r| r.models).unwrap_or_default(),
                }
            })
            .collect()
    }

    fn handle_register(&self, from: &PeerId, envelope: &Envelope) -> Result<Option<Envelope>> {
        let payload: RegisterPayload = envelope.payload_as()?;

        if let Err(err) = self.node.registry().claim_name(&payload.agent_name, from) {
            warn!(
                name = %payload.agent_name,
                peer = %from,
                error = %err,
                "rejected duplicate agent name"
            );
            let reply = Envelope::new(MessageKind::Error, self.local_id()).with_payload(
                &ErrorPayload {
                    error: err.to_string(),
                },
            )?;
            return Ok(Some(reply));
        }

        self.directory.upsert(AgentRecord {
            peer: from.clone(),
            name: payload.agent_name.clone(),
            endpoint: payload.endpoint,
            models: payload.models,
        });

        info!(name = %payload.agent_name, peer = %from, "agent registered");
        Ok(Some(self.pong()))
    }

    async fn handle_chat(&self, envelope: &Envelope) -> Result<Option<Envelope>> {
        let request: ChatRequest = envelope.payload_as()?;
        let response = self.backend.complete(request).await?;

        let mut reply =
            Envelope::new(MessageKind::Complete, self.local_id()).with_payload(&response)?;
        if let Some(request_id) = &envelope.request_id {
            reply = reply.with_request_id(request_id.clone());
        }
        Ok(Some(reply))
    }

    fn handle_announce(&self, from: &PeerId, envelope: &Envelope) -> Result<Option<Envelope>> {
        let payload: AnnouncePayload = envelope.payload_as()?;
        info!(
            peer = %from,
            kind = %payload.kind,
            name = %payload.name,
            url = %payload.url,
            tags = ?payload.tags,
            "received announcement"
        );
        Ok(Some(self.pong()))
    }
}

#[async_trait]
impl Dispatch for Agent {
    async fn dispatch(&self, from: &PeerId, envelope: Envelope) -> P2pResult<Option<Envelope>> {
        let result = match envelope.kind {
            MessageKind::Register => self.handle_register(from, &envelope),
            MessageKind::Chat => self.handle_chat(&envelope).await,
            MessageKind::Ping => Ok(Some(self.pong())),
            MessageKind::Announce => self.handle_announce(from, &envelope),
            MessageKind::Pong | MessageKind::Complete | MessageKind::Error => {
                debug!(kind = ?envelope.kind, peer = %from, "ignoring unsolicited reply kind");
                Ok(None)
            }
            MessageKind::Unknown(ref kind) => {
                warn!(kind = %kind, peer = %from, "ignoring unknown message type");
                Ok(None)
            }
        };
        result.map_err(Into::into)
    }
}
