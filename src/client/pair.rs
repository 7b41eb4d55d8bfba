//! Phone pairing request types.

/// Browser type shown on the phone's linked devices screen.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(i32)]
pub enum PairClientType {
    Unknown = 0,
    #[default]
    Chrome = 1,
    Edge = 2,
    Firefox = 3,
    Ie = 4,
    Opera = 5,
    Safari = 6,
    Electron = 7,
    Uwp = 8,
    OtherWebClient = 9,
}

/// Parameters for [`WaClient::pair_phone`](super::WaClient::pair_phone).
#[derive(Clone, Debug)]
pub struct PairPhoneRequest<'a> {
    /// International number, digits only.
    pub phone: &'a str,
    /// Ask the phone to show a notification for the code.
    pub show_push_notification: bool,
    pub client_type: PairClientType,
    /// Must be formatted as `Browser (OS)`.
    pub client_display_name: &'a str,
}
