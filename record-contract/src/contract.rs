//! The contract entry point a host calls once per round.
//!
//! Collaborators are passed in through [`ContractContext`] when the contract
//! is built, so a [`Contract`] is ready to run as soon as it exists.

use std::sync::Arc;

use tracing::{debug, info};

use crate::{
    channel::{Output, PeerChannel, UserId},
    config::NodeConfig,
    message::{Command, Response},
    router::Router,
    store::RecordStore,
};

pub struct ContractContext {
    pub output: Arc<dyn Output>,
    pub peers: Arc<dyn PeerChannel>,
    pub config: NodeConfig,
}

/// Input buffers one user sent since the previous round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInputs {
    pub user: UserId,
    pub inputs: Vec<Vec<u8>>,
}

impl UserInputs {
    pub fn new(user: UserId) -> Self {
        Self {
            user,
            inputs: Vec::new(),
        }
    }
}

/// Everything the host supplies for a single invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Round {
    pub read_only: bool,
    pub users: Vec<UserInputs>,
}

impl Round {
    pub fn new(read_only: bool) -> Self {
        Self {
            read_only,
            users: Vec::new(),
        }
    }

    /// Appends `input` to `user`'s buffers, registering the user on first use.
    pub fn push_input(&mut self, user: &UserId, input: Vec<u8>) {
        match self.users.iter_mut().find(|pending| &pending.user == user) {
            Some(pending) => pending.inputs.push(input),
            None => self.users.push(UserInputs {
                user: user.clone(),
                inputs: vec![input],
            }),
        }
    }

    pub fn remove_user(&mut self, user: &UserId) {
        self.users.retain(|pending| &pending.user != user);
    }

    pub fn input_count(&self) -> usize {
        self.users.iter().map(|pending| pending.inputs.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.input_count() == 0
    }
}

pub struct Contract<S> {
    router: Router<S>,
    peers: Arc<dyn PeerChannel>,
    config: NodeConfig,
}

impl<S: RecordStore> Contract<S> {
    pub fn new(store: S, context: ContractContext) -> Self {
        let ContractContext {
            output,
            peers,
            config,
        } = context;
        Self {
            router: Router::new(store, output),
            peers,
            config,
        }
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn peers(&self) -> &dyn PeerChannel {
        self.peers.as_ref()
    }

    pub async fn handle_command(&self, user: &UserId, command: &Command, read_only: bool) {
        self.router.handle(user, command, read_only).await;
    }

    /// Processes every input of every user in order and returns how many
    /// inputs were handled. Each input gets exactly one response.
    pub async fn run_round(&self, round: &Round) -> usize {
        let mut handled = 0;
        for pending in &round.users {
            for input in &pending.inputs {
                self.handle_input(&pending.user, input, round.read_only)
                    .await;
                handled += 1;
            }
        }

        info!(
            users = round.users.len(),
            inputs = handled,
            read_only = round.read_only,
            "round complete"
        );
        handled
    }

    async fn handle_input(&self, user: &UserId, input: &[u8], read_only: bool) {
        match Command::decode(input) {
            Ok(command) => self.handle_command(user, &command, read_only).await,
            Err(err) => {
                debug!(%user, error = %err, "input is not a command");
                self.router.emit(user, &Response::invalid_input()).await;
            }
        }
    }
}
