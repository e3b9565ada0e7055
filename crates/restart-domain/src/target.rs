use crate::ids::ServerName;

/// One server within a restart task. Immutable once the task starts.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RestartTarget {
    /// Unique within a task; keys the cross-task restart lock.
    pub server: ServerName,
    /// Standalone instance, no failover partner.
    pub standalone: bool,
    /// Member of an AlwaysOn availability group.
    pub always_on: bool,
    /// Environment tag, e.g. "prod" or "staging".
    pub environment: String,
}

impl RestartTarget {
    pub fn new(server: ServerName, environment: impl Into<String>) -> Self {
        Self {
            server,
            standalone: true,
            always_on: false,
            environment: environment.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let target = RestartTarget {
            server: ServerName::new("sql-prod-01").unwrap(),
            standalone: false,
            always_on: true,
            environment: "prod".to_string(),
        };
        let json = serde_json::to_string(&target).unwrap();
        let back: RestartTarget = serde_json::from_str(&json).unwrap();
        assert_eq!(back.server.as_str(), "sql-prod-01");
        assert!(back.always_on);
        assert_eq!(back.environment, "prod");
    }
}
