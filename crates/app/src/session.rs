use std::{fs, path::Path};

use engine::Identity;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Who was acting when the last command ran.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub identity: Option<Identity>,
}

impl Session {
    pub fn load(path: &str) -> Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(err) => return Err(err.into()),
        };
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &str) -> Result<()> {
        if let Some(parent) = Path::new(path).parent() {
            fs::create_dir_all(parent)?;
        }
        let payload = serde_json::to_string_pretty(self)?;
        fs::write(path, payload)?;
        Ok(())
    }

    /// An unresolved session acts as a guest.
    pub fn identity(&self) -> Identity {
        self.identity.clone().unwrap_or(Identity::Guest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_an_unresolved_session() {
        let session = Session::load("/nonexistent/duit_session.json").unwrap();
        assert_eq!(session, Session::default());
        assert_eq!(session.identity(), Identity::Guest);
    }

    #[test]
    fn identity_survives_a_save() {
        let dir = std::env::temp_dir().join(format!("duit-session-{}", uuid::Uuid::new_v4()));
        let path = dir.join("session.json");
        let path = path.to_string_lossy().to_string();

        let session = Session {
            identity: Some(Identity::user("alice")),
        };
        session.save(&path).unwrap();
        assert_eq!(Session::load(&path).unwrap(), session);

        fs::remove_dir_all(dir).unwrap();
    }
}
