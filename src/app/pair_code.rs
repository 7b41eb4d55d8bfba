use super::AppService;
use crate::client::{PairClientType, PairPhoneRequest};
use crate::error::{Error, Result};
use crate::validation::validate_login_with_code;
use tracing::{error, info, warn};

impl AppService {
    /// Link by phone number instead of QR: returns the code to type on the phone.
    pub async fn login_with_code(&self, phone: &str) -> Result<String> {
        if let Err(e) = validate_login_with_code(phone) {
            error!(error = %e, "invalid phone number for pairing code");
            return Err(e);
        }
        let client = self.client()?;
        if client.own_id().await.is_some() {
            warn!("pairing code requested while already logged in");
            return Err(Error::AlreadyLoggedIn);
        }

        // The pair request reports any connection problem itself.
        let _ = self.reconnect().await;

        let code = client
            .pair_phone(PairPhoneRequest {
                phone,
                show_push_notification: true,
                client_type: PairClientType::Chrome,
                client_display_name: &self.config.pair_client_name,
            })
            .await
            .map_err(|e| {
                error!(error = %e, "failed to pair phone");
                e
            })?;
        info!("pairing code issued");
        Ok(code)
    }
}
