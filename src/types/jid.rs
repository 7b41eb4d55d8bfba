use std::fmt;
use std::str::FromStr;

/// Server for regular user JIDs.
pub const DEFAULT_USER_SERVER: &str = "s.whatsapp.net";
/// Server for hidden-user (LID) JIDs.
pub const HIDDEN_USER_SERVER: &str = "lid";

/// WhatsApp identifier (`user@server`, or `user.agent:device@server` for a
/// specific linked device).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Jid {
    pub user: String,
    pub raw_agent: u8,
    pub device: u16,
    pub server: String,
}

impl Jid {
    pub fn new(user: impl Into<String>, server: impl Into<String>) -> Self {
        Self::new_ad(user, 0, 0, server)
    }

    /// JID addressing one device of an account.
    pub fn new_ad(
        user: impl Into<String>,
        agent: u8,
        device: u16,
        server: impl Into<String>,
    ) -> Self {
        Self {
            user: user.into(),
            raw_agent: agent,
            device,
            server: server.into(),
        }
    }

    /// Phone-number JID on the default user server.
    pub fn user(phone: impl Into<String>) -> Self {
        Self::new(phone, DEFAULT_USER_SERVER)
    }

    pub fn is_empty(&self) -> bool {
        self.server.is_empty()
    }
}

#[derive(Debug)]
pub struct JidParseError(String);

impl fmt::Display for JidParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid JID {:?}", self.0)
    }
}

impl std::error::Error for JidParseError {}

impl FromStr for Jid {
    type Err = JidParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let bad = || JidParseError(s.to_string());
        let Some((user_part, server)) = s.split_once('@') else {
            return Ok(Self::new("", s));
        };
        if server.contains('@') {
            return Err(bad());
        }
        let (user, agent_device) = match user_part.split_once('.') {
            Some((user, rest)) => (user, Some(rest)),
            None => match user_part.split_once(':') {
                Some((user, device)) => {
                    let device = device.parse().map_err(|_| bad())?;
                    return Ok(Self::new_ad(user, 0, device, server));
                }
                None => (user_part, None),
            },
        };
        let (agent, device) = match agent_device {
            None => (0, 0),
            Some(rest) => match rest.split_once(':') {
                Some((agent, device)) => (
                    agent.parse().map_err(|_| bad())?,
                    device.parse().map_err(|_| bad())?,
                ),
                None => (rest.parse().map_err(|_| bad())?, 0),
            },
        };
        Ok(Self::new_ad(user, agent, device, server))
    }
}

impl fmt::Display for Jid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.user.is_empty() {
            return f.write_str(&self.server);
        }
        f.write_str(&self.user)?;
        if self.raw_agent > 0 {
            write!(f, ".{}:{}", self.raw_agent, self.device)?;
        } else if self.device > 0 {
            write!(f, ":{}", self.device)?;
        }
        write!(f, "@{}", self.server)
    }
}

impl serde::Serialize for Jid {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for Jid {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
