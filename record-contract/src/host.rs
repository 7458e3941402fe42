//! Local TCP host that drives the contract in rounds.
//!
//! Every accepted connection is a user and every newline-delimited frame it
//! sends is one input buffer. Connection tasks only forward frames; a single
//! loop owns the [`Contract`] and runs the inputs collected since the last
//! tick as one [`Round`].

use std::{collections::HashMap, future::Future, io, net::SocketAddr, sync::Arc};

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use tokio::{
    io::{AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream, tcp::OwnedWriteHalf},
    select,
    sync::{Mutex, mpsc},
    time::{self, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use crate::{
    channel::{Output, PeerChannel, UserId},
    config::NodeConfig,
    contract::{Contract, ContractContext, Round},
    message::{Response, read_frame, write_message},
    store::RecordStore,
};

type Responder = mpsc::UnboundedSender<Response>;

/// Events queued from connections before their senders have to wait for
/// the round loop.
const EVENT_BUFFER: usize = 128;

pub struct Host {
    listener: TcpListener,
    config: NodeConfig,
}

impl Host {
    pub async fn bind(config: NodeConfig) -> Result<Self> {
        let listener = TcpListener::bind(config.listen)
            .await
            .with_context(|| format!("failed to bind {}", config.listen))?;
        Ok(Self { listener, config })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub async fn run_until<S, F>(self, store: S, shutdown: F) -> Result<()>
    where
        S: RecordStore,
        F: Future<Output = ()> + Send,
    {
        let Host { listener, config } = self;
        let read_only = config.read_only;

        let mut ticker = time::interval(config.round_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let connections = ConnectionOutput::default();
        let contract = Contract::new(
            store,
            ContractContext {
                output: Arc::new(connections.clone()),
                peers: Arc::new(TcpPeers::new(config.peers.clone())),
                config,
            },
        );

        let (events_tx, mut events_rx) = mpsc::channel(EVENT_BUFFER);
        let mut pending = Round::new(read_only);
        let mut next_id: u64 = 1;
        tokio::pin!(shutdown);

        loop {
            select! {
                _ = &mut shutdown => {
                    info!(dropped_inputs = pending.input_count(), "host shutting down");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let user = UserId::new(format!("user-{next_id}"));
                        next_id += 1;
                        spawn_connection(stream, peer, user, events_tx.clone());
                    }
                    Err(err) => warn!(error = ?err, "failed to accept connection"),
                },
                Some(event) = events_rx.recv() => {
                    apply_event(event, &connections, &mut pending).await;
                }
                _ = ticker.tick() => {
                    if !pending.is_empty() {
                        let round = std::mem::replace(&mut pending, Round::new(read_only));
                        contract.run_round(&round).await;
                    }
                }
            }
        }

        Ok(())
    }

    pub async fn run_until_ctrl_c<S: RecordStore>(self, store: S) -> Result<()> {
        self.run_until(store, async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = ?err, "failed to install ctrl-c handler");
            }
        })
        .await
    }
}

enum HostEvent {
    Connected { user: UserId, responder: Responder },
    Input { user: UserId, buffer: Vec<u8> },
    Disconnected { user: UserId },
}

async fn apply_event(event: HostEvent, connections: &ConnectionOutput, pending: &mut Round) {
    match event {
        HostEvent::Connected { user, responder } => {
            connections.register(user, responder).await;
        }
        HostEvent::Input { user, buffer } => pending.push_input(&user, buffer),
        HostEvent::Disconnected { user } => {
            connections.remove(&user).await;
            pending.remove_user(&user);
        }
    }
}

fn spawn_connection(
    stream: TcpStream,
    peer: SocketAddr,
    user: UserId,
    events: mpsc::Sender<HostEvent>,
) {
    tokio::spawn(async move {
        info!(%peer, %user, "user connected");
        if let Err(err) = handle_connection(stream, &user, &events).await {
            warn!(%peer, %user, error = ?err, "connection closed with error");
        }
        info!(%peer, %user, "user disconnected");
        let _ = events.send(HostEvent::Disconnected { user }).await;
    });
}

async fn handle_connection(
    stream: TcpStream,
    user: &UserId,
    events: &mpsc::Sender<HostEvent>,
) -> Result<()> {
    let (reader, writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    let (responder, responses) = mpsc::unbounded_channel();
    events
        .send(HostEvent::Connected {
            user: user.clone(),
            responder,
        })
        .await
        .map_err(|_| anyhow!("host loop has stopped"))?;

    // Writes run on their own task so a pending read never holds up delivery.
    tokio::spawn(forward_responses(writer, responses));

    while let Some(buffer) = read_frame(&mut reader).await? {
        events
            .send(HostEvent::Input {
                user: user.clone(),
                buffer,
            })
            .await
            .map_err(|_| anyhow!("host loop has stopped"))?;
    }

    Ok(())
}

async fn forward_responses(
    mut writer: OwnedWriteHalf,
    mut responses: mpsc::UnboundedReceiver<Response>,
) {
    while let Some(response) = responses.recv().await {
        if let Err(err) = write_message(&mut writer, &response).await {
            debug!(?err, "failed to write response to user");
            break;
        }
    }
}

/// Routes responses to the connection that owns each user.
#[derive(Clone, Default)]
struct ConnectionOutput {
    connections: Arc<Mutex<HashMap<UserId, Responder>>>,
}

impl ConnectionOutput {
    async fn register(&self, user: UserId, responder: Responder) {
        self.connections.lock().await.insert(user, responder);
    }

    async fn remove(&self, user: &UserId) {
        self.connections.lock().await.remove(user);
    }
}

#[async_trait]
impl Output for ConnectionOutput {
    async fn send(&self, user: &UserId, response: &Response) -> Result<()> {
        let connections = self.connections.lock().await;
        let Some(responder) = connections.get(user) else {
            bail!("user {user} is not connected");
        };
        responder
            .send(response.clone())
            .map_err(|_| anyhow!("connection for user {user} is closed"))
    }
}

/// Fire-and-forget line delivery to each trusted peer.
pub struct TcpPeers {
    peers: Vec<String>,
}

impl TcpPeers {
    pub fn new(peers: Vec<String>) -> Self {
        Self { peers }
    }
}

#[async_trait]
impl PeerChannel for TcpPeers {
    fn trusted(&self) -> &[String] {
        &self.peers
    }

    async fn broadcast(&self, message: &[u8]) -> Result<()> {
        let mut delivered = 0;
        for peer in &self.peers {
            match send_line(peer, message).await {
                Ok(()) => delivered += 1,
                Err(err) => warn!(peer, error = ?err, "failed to reach peer"),
            }
        }

        debug!(delivered, peers = self.peers.len(), "broadcast to trusted peers");
        if delivered == 0 && !self.peers.is_empty() {
            bail!("no trusted peer could be reached");
        }
        Ok(())
    }
}

async fn send_line(addr: &str, message: &[u8]) -> Result<()> {
    let mut stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("failed to connect to {addr}"))?;
    stream.write_all(message).await?;
    stream.write_all(b"\n").await?;
    stream.shutdown().await?;
    Ok(())
}
