use clap::Subcommand;
use patrolboard_core::{BoardConfig, DeviceApiClient, TokenStore};

#[derive(Subcommand)]
pub enum AuthAction {
    /// Run the device authorization flow and save the token
    Login,
    /// Remove the saved token
    Logout,
    /// Check whether a token is saved
    Status,
}

pub async fn run(action: AuthAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = BoardConfig::load()?;
    let store = TokenStore::new(&config.token_file);
    match action {
        AuthAction::Login => {
            let client = DeviceApiClient::new(&config.api_base_url, &config.client_id)?;
            let grant = client
                .authenticate(|auth| {
                    println!("To link this board, visit:");
                    println!(
                        "  {}",
                        auth.verification_uri_complete
                            .as_deref()
                            .unwrap_or(&auth.verification_uri)
                    );
                    println!("and enter code: {}", auth.user_code);
                })
                .await?;
            store.save(&grant.access_token)?;
            println!("authenticated; token saved to {}", store.path().display());
        }
        AuthAction::Logout => {
            store.clear()?;
            println!("token removed");
        }
        AuthAction::Status => {
            println!(
                "{}",
                if store.load().is_some() {
                    "authenticated"
                } else {
                    "not authenticated"
                }
            );
        }
    }
    Ok(())
}
