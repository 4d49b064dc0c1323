//! Round-trips a read-only RPC call through the live WebSocket transport
//! (spec §6: "served over WebSocket").

use std::sync::Arc;

use jsonrpsee::ws_client::WsClientBuilder;

use memoriae_node::dispatch::Node;
use memoriae_node::rpc::MemoriaeApiClient;
use memoriae_runtime::Address;

#[tokio::test]
async fn balance_of_round_trips_over_the_wire() {
    let admin = Address::from_bytes(&[1u8; 20]);
    let foundation = Address::from_bytes(&[2u8; 20]);
    let node = Arc::new(Node::bootstrap(admin, foundation, memoriae_runtime::Amount::from(100u64), memoriae_runtime::Amount::from(50u64)));

    let addr = "127.0.0.1:18645".parse().unwrap();
    let handle = memoriae_node::server::serve(node.clone(), addr).await.expect("server binds");

    let client = WsClientBuilder::default().build("ws://127.0.0.1:18645").await.expect("client connects");
    let token = node.query_token_addresses()[0];
    let balance = client.balance_of(token, admin).await.expect("rpc call succeeds");
    assert_eq!(balance, node.balance_of(&token, &admin));

    handle.stop().expect("server stops");
}
