//! Endpoint management commands

use anyhow::Result;
use botho_keychain::endpoint::{discovery::DiscoveryService, EndpointId, HttpDiscovery};

use super::{print_error, print_success, print_warning, Home};

/// List candidate endpoints, preferred first
pub async fn list(home: &Home) -> Result<()> {
    let registry = home.registry();
    let list = registry.list().await?;
    let custom = registry.custom().await?;

    println!();
    println!("Endpoints ({}):", list.len());
    println!();
    for (i, id) in list.iter().enumerate() {
        let marker = if i == 0 { "*" } else { " " };
        let origin = if custom.contains(id) { " (custom)" } else { "" };
        println!("  {} {}{}", marker, id, origin);
    }
    Ok(())
}

/// Add a custom endpoint
pub async fn add(home: &Home, url: &str) -> Result<()> {
    if home.registry().add_custom(url).await? {
        print_success(&format!("Added {}", url));
    } else {
        print_warning(&format!("{} is already in the list", url));
    }
    Ok(())
}

/// Remove a custom endpoint
pub async fn remove(home: &Home, url: &str) -> Result<()> {
    if home.registry().remove_custom(url).await? {
        print_success(&format!("Removed {}", url));
    } else {
        print_error(&format!("{} is not a custom endpoint", url));
    }
    Ok(())
}

/// Persist the preferred endpoint
pub async fn use_endpoint(home: &Home, endpoint: &str) -> Result<()> {
    let registry = home.registry();
    let id = EndpointId::from(endpoint);

    if !registry.list().await?.contains(&id) {
        print_error(&format!(
            "{} is not a known endpoint. Add it first with 'endpoints add'.",
            id
        ));
        return Ok(());
    }

    registry.set_preferred(&id).await?;
    print_success(&format!("Now using {}", id));
    Ok(())
}

/// Show the endpoint DEFAULT resolves to
pub async fn resolve(home: &Home) -> Result<()> {
    let endpoints = &home.config.endpoints;
    let discovery = HttpDiscovery::new(endpoints)?;

    match discovery.recommended_endpoint().await {
        Ok(url) => println!("DEFAULT -> {}", url),
        Err(e) => {
            print_warning(&e.to_string());
            println!("DEFAULT -> {} (fallback)", endpoints.fallback_url);
        }
    }
    Ok(())
}
