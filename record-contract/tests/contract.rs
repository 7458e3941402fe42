use std::sync::Arc;

use record_contract::{
    channel::{BufferedOutput, UserId},
    config::NodeConfig,
    contract::{Contract, ContractContext, Round, UserInputs},
    host::TcpPeers,
    message::{Command, READ_ONLY_UNSUPPORTED, Response},
    records::{CLEARED, CLEAR_FAILED, NO_RECORDS, RECORDED},
    store::{FileStore, MemoryStore, RecordStore},
};
use serde_json::json;

fn contract_with<S: RecordStore>(store: S) -> (Contract<S>, Arc<BufferedOutput>) {
    let output = Arc::new(BufferedOutput::new());
    let contract = Contract::new(
        store,
        ContractContext {
            output: output.clone(),
            peers: Arc::new(TcpPeers::new(Vec::new())),
            config: NodeConfig::default(),
        },
    );
    (contract, output)
}

fn input(command: &Command) -> Vec<u8> {
    command.encode().expect("encode command")
}

fn single_user_round(read_only: bool, user: &UserId, inputs: Vec<Vec<u8>>) -> Round {
    Round {
        read_only,
        users: vec![UserInputs {
            user: user.clone(),
            inputs,
        }],
    }
}

#[tokio::test]
async fn create_then_read_scenario() {
    let (contract, output) = contract_with(MemoryStore::new());
    let user = UserId::from("alice-pubkey");

    let round = single_user_round(
        false,
        &user,
        vec![
            br#"{"type":"CREATE_RECORD","uri":"alice","record":{"balance":10}}"#.to_vec(),
            br#"{"type":"READ_RECORD","uri":"alice"}"#.to_vec(),
        ],
    );
    assert_eq!(contract.run_round(&round).await, 2);

    assert_eq!(
        output.responses_for(&user).await,
        vec![
            Response::data("success"),
            Response::data(json!({"balance": 10})),
        ]
    );
}

#[tokio::test]
async fn read_of_missing_resource_scenario() {
    let (contract, output) = contract_with(MemoryStore::new());
    let user = UserId::from("bob");

    contract
        .handle_command(&user, &Command::read("ghost"), false)
        .await;

    assert_eq!(
        output.take().await,
        vec![(user, Response::error(NO_RECORDS))]
    );
}

#[tokio::test]
async fn delete_after_create_scenario() {
    let (contract, output) = contract_with(MemoryStore::new());
    let user = UserId::from("alice");

    let round = single_user_round(
        false,
        &user,
        vec![
            input(&Command::create("alice", json!({"balance": 10}))),
            input(&Command::delete("alice")),
            input(&Command::read("alice")),
            input(&Command::delete("alice")),
        ],
    );
    contract.run_round(&round).await;

    assert_eq!(
        output.responses_for(&user).await,
        vec![
            Response::data(RECORDED),
            Response::data(CLEARED),
            Response::error(NO_RECORDS),
            Response::error(CLEAR_FAILED),
        ]
    );
}

#[tokio::test]
async fn read_only_round_leaves_storage_untouched() {
    let store = Arc::new(MemoryStore::new());
    let (contract, output) = contract_with(Arc::clone(&store));
    let user = UserId::from("observer");

    let round = single_user_round(
        true,
        &user,
        vec![
            input(&Command::create("alice", json!(1))),
            input(&Command::update("alice", json!(2))),
            input(&Command::delete("alice")),
            input(&Command::new("TRANSFER", "alice")),
            input(&Command::read("alice")),
        ],
    );
    contract.run_round(&round).await;

    assert!(store.is_empty().await);
    assert_eq!(
        output.responses_for(&user).await,
        vec![
            Response::error(READ_ONLY_UNSUPPORTED),
            Response::error(READ_ONLY_UNSUPPORTED),
            Response::error(READ_ONLY_UNSUPPORTED),
            Response::invalid_input(),
            Response::error(NO_RECORDS),
        ]
    );
}

#[tokio::test]
async fn malformed_inputs_do_not_stop_the_round() {
    let (contract, output) = contract_with(MemoryStore::new());
    let user = UserId::from("carol");

    let round = single_user_round(
        false,
        &user,
        vec![
            b"definitely not json".to_vec(),
            br#"{"uri":"alice"}"#.to_vec(),
            br#"{"type":42,"uri":"alice"}"#.to_vec(),
            input(&Command::create("../escape", json!(1))),
            input(&Command::create("carol", json!("ok"))),
        ],
    );
    assert_eq!(contract.run_round(&round).await, 5);

    assert_eq!(
        output.responses_for(&user).await,
        vec![
            Response::invalid_input(),
            Response::invalid_input(),
            Response::invalid_input(),
            Response::invalid_input(),
            Response::data(RECORDED),
        ]
    );
}

#[tokio::test]
async fn users_are_served_in_order_with_one_response_per_input() {
    let (contract, output) = contract_with(MemoryStore::new());
    let alice = UserId::from("alice");
    let bob = UserId::from("bob");

    let round = Round {
        read_only: false,
        users: vec![
            UserInputs {
                user: alice.clone(),
                inputs: vec![
                    input(&Command::create("shared", json!({"v": 1}))),
                    input(&Command::update("shared", json!({"v": 2}))),
                ],
            },
            UserInputs::new(UserId::from("idle")),
            UserInputs {
                user: bob.clone(),
                inputs: vec![input(&Command::read("shared"))],
            },
        ],
    };
    assert_eq!(contract.run_round(&round).await, 3);

    assert_eq!(
        output.take().await,
        vec![
            (alice.clone(), Response::data(RECORDED)),
            (alice, Response::data(RECORDED)),
            (bob, Response::data(json!({"v": 2}))),
        ]
    );
}

#[tokio::test]
async fn file_store_keeps_one_log_file_per_uri() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = FileStore::new(dir.path()).expect("open store");
    let (contract, output) = contract_with(store);
    let user = UserId::from("alice");

    contract
        .handle_command(
            &user,
            &Command::create("alice", json!({"balance": 10})),
            false,
        )
        .await;

    let contents = std::fs::read_to_string(dir.path().join("alice.log")).expect("record file");
    let stored: serde_json::Value = serde_json::from_str(&contents).expect("json on disk");
    assert_eq!(stored, json!({"balance": 10}));

    contract
        .handle_command(&user, &Command::create("../outside", json!(1)), false)
        .await;
    assert!(!dir.path().join("../outside.log").exists());

    assert_eq!(
        output.responses_for(&user).await,
        vec![Response::data(RECORDED), Response::invalid_input()]
    );
}

#[tokio::test]
async fn contract_exposes_injected_config_and_peers() {
    let output = Arc::new(BufferedOutput::new());
    let config = NodeConfig {
        read_only: true,
        peers: vec!["127.0.0.1:9".into()],
        ..NodeConfig::default()
    };
    let contract = Contract::new(
        MemoryStore::new(),
        ContractContext {
            output,
            peers: Arc::new(TcpPeers::new(config.peers.clone())),
            config: config.clone(),
        },
    );

    assert_eq!(contract.config(), &config);
    assert_eq!(contract.peers().trusted().to_vec(), vec!["127.0.0.1:9".to_string()]);
}

#[tokio::test]
async fn full_precision_numbers_survive_create_then_read() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (contract, output) = contract_with(FileStore::new(dir.path()).expect("open store"));
    let user = UserId::from("alice");

    let round = single_user_round(
        false,
        &user,
        vec![
            br#"{"type":"CREATE_RECORD","uri":"price","record":971986.3718547629}"#.to_vec(),
            br#"{"type":"READ_RECORD","uri":"price"}"#.to_vec(),
            br#"{"type":"CREATE_RECORD","uri":"tiny","record":{"v":1.0715660391465826e-75}}"#
                .to_vec(),
            br#"{"type":"READ_RECORD","uri":"tiny"}"#.to_vec(),
        ],
    );
    contract.run_round(&round).await;

    let responses = output.responses_for(&user).await;
    let read_number = |response: &Response| match response {
        Response::DataResult { data } => data.clone(),
        other => panic!("unexpected response: {other:?}"),
    };

    let price = read_number(&responses[1]);
    assert_eq!(
        price.as_f64().expect("number").to_bits(),
        971986.3718547629f64.to_bits()
    );
    let tiny = read_number(&responses[3]);
    assert_eq!(
        tiny["v"].as_f64().expect("number").to_bits(),
        1.0715660391465826e-75f64.to_bits()
    );
}
