//! Node status command

use anyhow::Result;
use botho_keychain::{
    endpoint::{EndpointSession, HttpDiscovery},
    network::JsonRpcClient,
    EndpointId,
};

use super::{print_error, Home};

/// Run the status command
pub async fn run(home: &Home, endpoint: Option<String>) -> Result<()> {
    let endpoints = &home.config.endpoints;
    let registry = home.registry();

    let target = match endpoint {
        Some(endpoint) => EndpointId::from(endpoint),
        None => registry.preferred().await?,
    };

    let client = JsonRpcClient::new(endpoints.initial_endpoint.clone())?;
    let discovery = HttpDiscovery::new(endpoints)?;
    let mut session = EndpointSession::new(registry, discovery, client, endpoints);
    session.select_endpoint(&target, false).await;

    if session.current() != &target {
        print_error(&format!(
            "{} is not a known endpoint, using {}",
            target,
            session.current()
        ));
    }
    if *session.current() == EndpointId::Testnet {
        print_error("TESTNET has no node to query");
        return Ok(());
    }

    let url = session.client().options().url;
    println!();
    println!("Endpoint: {} ({})", session.current(), url);

    match session.client().node_status().await {
        Ok(status) => {
            println!("  Version:     {}", status.version);
            println!("  Network:     {}", status.network);
            println!("  Sync:        {}", status.sync_status);
            println!("  Height:      {}", status.chain_height);
            println!("  Peers:       {}", status.peer_count);
        }
        Err(e) => print_error(&format!("Node did not answer: {}", e)),
    }
    Ok(())
}
