//! Lobby defaults and limits.

/// Configuration shared by every lobby the manager creates.
#[derive(Debug, Clone)]
pub struct LobbyConfig {
    /// Capacity used when `CREATE_LOBBY` omits `max_players`. Lowered to
    /// the selected map's maximum if that is smaller.
    pub default_max_players: usize,

    /// Largest `max_players` a client may ask for.
    pub max_players_cap: usize,

    /// Map used when `CREATE_LOBBY` omits `map_id`. When unset, or not in
    /// the catalog, the catalog's first map (by ID) is used.
    pub default_map_id: Option<String>,

    /// Longest lobby name accepted, in characters.
    pub max_lobby_name_len: usize,

    /// Longest chat message accepted, in characters.
    pub max_chat_len: usize,
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            default_max_players: 6,
            max_players_cap: 6,
            default_map_id: None,
            max_lobby_name_len: 64,
            max_chat_len: 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lobby_config_default() {
        let config = LobbyConfig::default();
        assert_eq!(config.default_max_players, 6);
        assert_eq!(config.max_players_cap, 6);
        assert!(config.default_map_id.is_none());
        assert_eq!(config.max_lobby_name_len, 64);
        assert_eq!(config.max_chat_len, 500);
    }
}
