use anyhow::Result;

use crate::api::routes::discord::InteractionVerifier;
use crate::core::AppContext;

pub struct AppState {
    pub ctx: AppContext,
    /// None when no Discord public key is configured.
    pub interactions: Option<InteractionVerifier>,
}

impl AppState {
    pub fn new(ctx: AppContext) -> Result<Self> {
        let interactions = if ctx.config.discord_public_key.is_empty() {
            tracing::warn!("ROLLCALL_DISCORD_PUBLIC_KEY is not set, RSVP buttons won't be answered");
            None
        } else {
            Some(InteractionVerifier::from_hex(&ctx.config.discord_public_key)?)
        };
        Ok(Self { ctx, interactions })
    }
}
