//! A single lobby: roster, readiness, message log, and status.
//!
//! Every operation takes the lobby's one `Mutex` for its whole duration,
//! so joins, leaves, ready toggles, and starts are linearized per lobby.
//! Two joins racing for the last seat can't both get in.

use chrono::{DateTime, Utc};
use powerline_maps::PlayerCount;
use powerline_protocol::{
    LobbyId, LobbyMessage, LobbyStatus, LobbySummary, LobbyView, MemberView, MessageKind,
    PlayerId, RosterEntry, SessionId,
};
use tokio::sync::Mutex;

use crate::LobbyError;

/// Fewest players any game can start with.
pub(crate) const MIN_PLAYERS: usize = 2;

/// Who is joining: the caller's session plus the name others will see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub session_id: SessionId,
    pub player_id: PlayerId,
    pub player_name: String,
}

/// One seat in the roster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub session_id: SessionId,
    pub player_id: PlayerId,
    pub player_name: String,
    pub is_host: bool,
    pub is_ready: bool,
    pub joined_at: DateTime<Utc>,
}

impl Member {
    fn view(&self) -> MemberView {
        MemberView {
            player_id: self.player_id,
            player_name: self.player_name.clone(),
            is_host: self.is_host,
            is_ready: self.is_ready,
            joined_at: self.joined_at,
        }
    }
}

/// What [`Lobby::remove_member`] did.
#[derive(Debug, Clone)]
pub struct Removal {
    pub member: Member,
    /// Set when the removed member was host and someone was promoted.
    pub new_host: Option<PlayerId>,
    /// Members left after the removal.
    pub remaining: usize,
    pub view: LobbyView,
}

/// Everything the game engine needs once a lobby has moved to `starting`.
#[derive(Debug, Clone)]
pub struct StartTicket {
    pub lobby_id: LobbyId,
    pub map_id: Option<String>,
    /// Seats in join order.
    pub roster: Vec<RosterEntry>,
    /// Sessions of the seated players, same order as `roster`.
    pub sessions: Vec<SessionId>,
    pub view: LobbyView,
}

struct LobbyState {
    name: String,
    status: LobbyStatus,
    /// Join order. Index 0 is the earliest-joined member.
    members: Vec<Member>,
    messages: Vec<LobbyMessage>,
    password: Option<String>,
    game_id: Option<String>,
    updated_at: DateTime<Utc>,
    revision: u64,
    next_message_id: u64,
}

impl LobbyState {
    fn position(&self, session_id: &SessionId) -> Option<usize> {
        self.members.iter().position(|m| &m.session_id == session_id)
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
        self.revision += 1;
    }

    fn push_message(
        &mut self,
        kind: MessageKind,
        author: Option<(PlayerId, String)>,
        text: String,
    ) -> LobbyMessage {
        self.next_message_id += 1;
        let (player_id, player_name) = match author {
            Some((id, name)) => (Some(id), Some(name)),
            None => (None, None),
        };
        let message = LobbyMessage {
            id: self.next_message_id,
            kind,
            player_id,
            player_name,
            text,
            timestamp: Utc::now(),
        };
        self.messages.push(message.clone());
        message
    }

    fn system(&mut self, text: impl Into<String>) {
        self.push_message(MessageKind::System, None, text.into());
    }

    fn transition(&mut self, lobby_id: LobbyId, to: LobbyStatus) -> Result<(), LobbyError> {
        if !self.status.can_transition_to(to) {
            return Err(LobbyError::InvalidState {
                lobby_id,
                status: self.status,
            });
        }
        tracing::debug!(%lobby_id, from = %self.status, %to, "lobby status changed");
        self.status = to;
        Ok(())
    }

    fn start_blocker(&self) -> Option<LobbyError> {
        if self.members.len() < MIN_PLAYERS {
            return Some(LobbyError::NotEnoughPlayers {
                have: self.members.len(),
                need: MIN_PLAYERS,
            });
        }
        if self.members.iter().any(|m| !m.is_ready) {
            return Some(LobbyError::NotReady);
        }
        None
    }
}

/// One pending game room.
///
/// `id`, `max_players`, `map_id`, and `created_at` never change after
/// creation and are readable without the lock.
pub struct Lobby {
    id: LobbyId,
    max_players: usize,
    map_id: Option<String>,
    created_at: DateTime<Utc>,
    state: Mutex<LobbyState>,
}

impl Lobby {
    /// Creates a lobby with `host` already seated as host and ready.
    pub fn new(
        id: LobbyId,
        name: String,
        host: Participant,
        max_players: usize,
        password: Option<String>,
        map_id: Option<String>,
    ) -> Self {
        let now = Utc::now();
        let mut state = LobbyState {
            name,
            status: LobbyStatus::Waiting,
            members: vec![Member {
                session_id: host.session_id,
                player_id: host.player_id,
                player_name: host.player_name.clone(),
                is_host: true,
                is_ready: true,
                joined_at: now,
            }],
            messages: Vec::new(),
            password,
            game_id: None,
            updated_at: now,
            revision: 1,
            next_message_id: 0,
        };
        state.system(format!("{} created the lobby", host.player_name));

        Self {
            id,
            max_players,
            map_id,
            created_at: now,
            state: Mutex::new(state),
        }
    }

    pub fn id(&self) -> LobbyId {
        self.id
    }

    pub fn max_players(&self) -> usize {
        self.max_players
    }

    pub fn map_id(&self) -> Option<&str> {
        self.map_id.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    // -- Roster -----------------------------------------------------------

    /// Seats `participant` as a not-ready member.
    ///
    /// Fails if the lobby isn't `waiting`, the password doesn't match, the
    /// session is already seated, or the roster is full.
    pub async fn add_member(
        &self,
        participant: Participant,
        password: Option<&str>,
    ) -> Result<LobbyView, LobbyError> {
        let mut state = self.state.lock().await;

        if !state.status.is_joinable() {
            return Err(LobbyError::NotJoinable(self.id, state.status));
        }
        if state.position(&participant.session_id).is_some() {
            return Err(LobbyError::AlreadyMember(self.id));
        }
        if let Some(expected) = state.password.as_deref() {
            if password != Some(expected) {
                return Err(LobbyError::WrongPassword);
            }
        }
        if state.members.len() >= self.max_players {
            return Err(LobbyError::Full(self.id));
        }

        let name = participant.player_name.clone();
        state.members.push(Member {
            session_id: participant.session_id,
            player_id: participant.player_id,
            player_name: participant.player_name,
            is_host: false,
            is_ready: false,
            joined_at: Utc::now(),
        });
        state.system(format!("{name} joined the lobby"));
        state.touch();

        tracing::info!(lobby_id = %self.id, player = %name, members = state.members.len(), "player joined lobby");
        Ok(self.view_locked(&state))
    }

    /// Removes a member. `None` if the session wasn't seated.
    ///
    /// When the host leaves and anyone remains, the earliest-joined
    /// remaining member becomes host.
    pub async fn remove_member(&self, session_id: &SessionId) -> Option<Removal> {
        let mut state = self.state.lock().await;
        let index = state.position(session_id)?;
        let member = state.members.remove(index);
        state.system(format!("{} left the lobby", member.player_name));

        let mut new_host = None;
        if member.is_host {
            if let Some(next) = state.members.first_mut() {
                next.is_host = true;
                new_host = Some((next.player_id, next.player_name.clone()));
            }
        }
        if let Some((_, name)) = &new_host {
            let text = format!("{name} is now the host");
            state.system(text);
        }
        state.touch();

        tracing::info!(
            lobby_id = %self.id,
            player = %member.player_name,
            remaining = state.members.len(),
            new_host = ?new_host.as_ref().map(|(id, _)| *id),
            "player left lobby"
        );

        Some(Removal {
            remaining: state.members.len(),
            new_host: new_host.map(|(id, _)| id),
            view: self.view_locked(&state),
            member,
        })
    }

    pub async fn set_ready(&self, session_id: &SessionId, ready: bool) -> Result<LobbyView, LobbyError> {
        let mut state = self.state.lock().await;
        if state.status != LobbyStatus::Waiting {
            return Err(LobbyError::InvalidState {
                lobby_id: self.id,
                status: state.status,
            });
        }
        let index = state.position(session_id).ok_or(LobbyError::NotMember(self.id))?;
        state.members[index].is_ready = ready;
        let name = state.members[index].player_name.clone();
        state.system(if ready {
            format!("{name} is ready")
        } else {
            format!("{name} is not ready")
        });
        state.touch();
        Ok(self.view_locked(&state))
    }

    /// At least two members and every one of them ready.
    ///
    /// Map player bounds are checked separately by [`start`](Self::start).
    pub async fn can_start(&self) -> bool {
        self.state.lock().await.start_blocker().is_none()
    }

    /// Moves a `waiting` lobby to `starting` on behalf of `requester`.
    ///
    /// Under the one lock: the requester must be the host, every member
    /// ready, at least two seated, and the count within `bounds` when the
    /// lobby has a map. Calling it again once started fails with
    /// [`LobbyError::InvalidState`] and changes nothing.
    pub async fn start(
        &self,
        requester: &SessionId,
        bounds: Option<&PlayerCount>,
    ) -> Result<StartTicket, LobbyError> {
        let mut state = self.state.lock().await;

        if state.status != LobbyStatus::Waiting {
            return Err(LobbyError::InvalidState {
                lobby_id: self.id,
                status: state.status,
            });
        }
        let index = state.position(requester).ok_or(LobbyError::NotMember(self.id))?;
        if !state.members[index].is_host {
            return Err(LobbyError::NotHost);
        }
        if let Some(blocker) = state.start_blocker() {
            return Err(blocker);
        }
        if let (Some(bounds), Some(map_id)) = (bounds, self.map_id.as_ref()) {
            let have = state.members.len();
            if !bounds.allows(have) {
                return Err(LobbyError::PlayerCount {
                    map_id: map_id.clone(),
                    have,
                    min: bounds.min,
                    max: bounds.max,
                });
            }
        }

        state.transition(self.id, LobbyStatus::Starting)?;
        state.system("Game is starting");
        state.touch();

        let roster = state
            .members
            .iter()
            .enumerate()
            .map(|(i, m)| RosterEntry {
                seat: i + 1,
                player_id: m.player_id,
                player_name: m.player_name.clone(),
            })
            .collect();
        let sessions = state.members.iter().map(|m| m.session_id.clone()).collect();

        tracing::info!(lobby_id = %self.id, players = state.members.len(), "lobby starting");
        Ok(StartTicket {
            lobby_id: self.id,
            map_id: self.map_id.clone(),
            roster,
            sessions,
            view: self.view_locked(&state),
        })
    }

    /// Records a successful handoff: `starting` → `in_game`.
    pub async fn mark_in_game(&self, game_id: String) -> Result<LobbyView, LobbyError> {
        let mut state = self.state.lock().await;
        state.transition(self.id, LobbyStatus::InGame)?;
        state.system(format!("Game {game_id} started"));
        state.game_id = Some(game_id);
        state.touch();
        Ok(self.view_locked(&state))
    }

    /// Backs out of a failed handoff: `starting` → `waiting`, every ready
    /// flag cleared.
    pub async fn abort_start(&self, reason: &str) -> Result<LobbyView, LobbyError> {
        let mut state = self.state.lock().await;
        state.transition(self.id, LobbyStatus::Waiting)?;
        for member in &mut state.members {
            member.is_ready = false;
        }
        state.system(format!("Game could not start: {reason}"));
        state.touch();
        tracing::warn!(lobby_id = %self.id, %reason, "lobby start aborted");
        Ok(self.view_locked(&state))
    }

    /// Marks the lobby `ended` if nobody is seated. Returns whether it did.
    pub(crate) async fn end_if_empty(&self) -> bool {
        let mut state = self.state.lock().await;
        if !state.members.is_empty() {
            return false;
        }
        if state.status != LobbyStatus::Ended {
            // Every non-ended status may move to `ended`.
            let _ = state.transition(self.id, LobbyStatus::Ended);
            state.touch();
        }
        true
    }

    /// Marks the lobby `ended` regardless of who is seated.
    pub(crate) async fn end(&self) {
        let mut state = self.state.lock().await;
        if state.status != LobbyStatus::Ended {
            let _ = state.transition(self.id, LobbyStatus::Ended);
            state.touch();
        }
    }

    // -- Chat ---------------------------------------------------------------

    /// Appends a chat line from a member. `None` (and nothing appended)
    /// if the session isn't seated.
    pub async fn add_message(&self, session_id: &SessionId, text: String) -> Option<LobbyMessage> {
        let mut state = self.state.lock().await;
        let index = state.position(session_id)?;
        let author = (state.members[index].player_id, state.members[index].player_name.clone());
        let message = state.push_message(MessageKind::Chat, Some(author), text);
        state.touch();
        Some(message)
    }

    // -- Queries ------------------------------------------------------------

    pub async fn status(&self) -> LobbyStatus {
        self.state.lock().await.status
    }

    pub async fn is_member(&self, session_id: &SessionId) -> bool {
        self.state.lock().await.position(session_id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.members.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.members.is_empty()
    }

    pub async fn members(&self) -> Vec<Member> {
        self.state.lock().await.members.clone()
    }

    /// Sessions of every seated member, in join order.
    pub async fn member_sessions(&self) -> Vec<SessionId> {
        let state = self.state.lock().await;
        state.members.iter().map(|m| m.session_id.clone()).collect()
    }

    /// Full external view. Never includes the password or session IDs.
    pub async fn view(&self) -> LobbyView {
        let state = self.state.lock().await;
        self.view_locked(&state)
    }

    pub async fn summary(&self) -> LobbySummary {
        let state = self.state.lock().await;
        LobbySummary {
            lobby_id: self.id,
            name: state.name.clone(),
            status: state.status,
            player_count: state.members.len(),
            max_players: self.max_players,
            has_password: state.password.is_some(),
            map_id: self.map_id.clone(),
            created_at: self.created_at,
        }
    }

    fn view_locked(&self, state: &LobbyState) -> LobbyView {
        LobbyView {
            lobby_id: self.id,
            name: state.name.clone(),
            status: state.status,
            revision: state.revision,
            members: state.members.iter().map(Member::view).collect(),
            messages: state.messages.clone(),
            max_players: self.max_players,
            map_id: self.map_id.clone(),
            has_password: state.password.is_some(),
            game_id: state.game_id.clone(),
            created_at: self.created_at,
            updated_at: state.updated_at,
        }
    }
}

impl std::fmt::Debug for Lobby {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lobby")
            .field("id", &self.id)
            .field("max_players", &self.max_players)
            .field("map_id", &self.map_id)
            .finish_non_exhaustive()
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn participant(n: u64) -> Participant {
        Participant {
            session_id: SessionId(format!("s{n}")),
            player_id: PlayerId(n),
            player_name: format!("Player {n}"),
        }
    }

    fn sid(n: u64) -> SessionId {
        SessionId(format!("s{n}"))
    }

    fn lobby(max: usize) -> Lobby {
        Lobby::new(LobbyId(1), "Test".into(), participant(1), max, None, None)
    }

    // =====================================================================
    // new()
    // =====================================================================

    #[tokio::test]
    async fn test_new_seats_host_as_ready() {
        let lobby = lobby(4);
        let members = lobby.members().await;
        assert_eq!(members.len(), 1);
        assert!(members[0].is_host);
        assert!(members[0].is_ready);
        assert_eq!(lobby.status().await, LobbyStatus::Waiting);
        assert_eq!(lobby.view().await.messages.len(), 1);
    }

    // =====================================================================
    // add_member()
    // =====================================================================

    #[tokio::test]
    async fn test_add_member_joins_not_ready() {
        let lobby = lobby(4);
        let view = lobby.add_member(participant(2), None).await.unwrap();
        assert_eq!(view.members.len(), 2);
        assert!(!view.members[1].is_ready);
        assert!(!view.members[1].is_host);
        assert_eq!(view.messages.last().unwrap().text, "Player 2 joined the lobby");
        assert_eq!(view.messages.last().unwrap().kind, MessageKind::System);
    }

    #[tokio::test]
    async fn test_add_member_rejects_full_lobby() {
        let lobby = lobby(2);
        lobby.add_member(participant(2), None).await.unwrap();
        let err = lobby.add_member(participant(3), None).await.unwrap_err();
        assert_eq!(err, LobbyError::Full(LobbyId(1)));
        assert_eq!(lobby.len().await, 2);
    }

    #[tokio::test]
    async fn test_add_member_rejects_duplicate() {
        let lobby = lobby(4);
        let err = lobby.add_member(participant(1), None).await.unwrap_err();
        assert_eq!(err, LobbyError::AlreadyMember(LobbyId(1)));
    }

    #[tokio::test]
    async fn test_add_member_checks_password() {
        let lobby = Lobby::new(LobbyId(1), "Secret".into(), participant(1), 4, Some("pw".into()), None);
        assert_eq!(lobby.add_member(participant(2), None).await.unwrap_err(), LobbyError::WrongPassword);
        assert_eq!(
            lobby.add_member(participant(2), Some("nope")).await.unwrap_err(),
            LobbyError::WrongPassword
        );
        lobby.add_member(participant(2), Some("pw")).await.unwrap();
        assert!(lobby.view().await.has_password);
    }

    #[tokio::test]
    async fn test_add_member_rejects_when_not_waiting() {
        let lobby = lobby(4);
        lobby.add_member(participant(2), None).await.unwrap();
        lobby.set_ready(&sid(2), true).await.unwrap();
        lobby.start(&sid(1), None).await.unwrap();

        let err = lobby.add_member(participant(3), None).await.unwrap_err();
        assert_eq!(err, LobbyError::NotJoinable(LobbyId(1), LobbyStatus::Starting));
    }

    // =====================================================================
    // remove_member()
    // =====================================================================

    #[tokio::test]
    async fn test_remove_member_absent_is_noop() {
        let lobby = lobby(4);
        let before = lobby.view().await;
        assert!(lobby.remove_member(&sid(9)).await.is_none());
        assert_eq!(lobby.view().await.revision, before.revision);
    }

    #[tokio::test]
    async fn test_remove_host_promotes_earliest_joined() {
        let lobby = lobby(4);
        lobby.add_member(participant(2), None).await.unwrap();
        lobby.add_member(participant(3), None).await.unwrap();

        let removal = lobby.remove_member(&sid(1)).await.unwrap();

        assert_eq!(removal.new_host, Some(PlayerId(2)));
        assert_eq!(removal.remaining, 2);
        let hosts: Vec<_> = removal.view.members.iter().filter(|m| m.is_host).collect();
        assert_eq!(hosts.len(), 1);
        assert_eq!(hosts[0].player_id, PlayerId(2));
        assert_eq!(removal.view.messages.last().unwrap().text, "Player 2 is now the host");
    }

    #[tokio::test]
    async fn test_remove_non_host_keeps_host() {
        let lobby = lobby(4);
        lobby.add_member(participant(2), None).await.unwrap();
        let removal = lobby.remove_member(&sid(2)).await.unwrap();
        assert!(removal.new_host.is_none());
        assert!(removal.view.members[0].is_host);
    }

    #[tokio::test]
    async fn test_remove_last_member_leaves_empty_roster() {
        let lobby = lobby(4);
        let removal = lobby.remove_member(&sid(1)).await.unwrap();
        assert_eq!(removal.remaining, 0);
        assert!(removal.new_host.is_none());
        assert!(lobby.end_if_empty().await);
        assert_eq!(lobby.status().await, LobbyStatus::Ended);
    }

    // =====================================================================
    // set_ready() / can_start()
    // =====================================================================

    #[tokio::test]
    async fn test_can_start_needs_two_players() {
        let lobby = lobby(4);
        assert!(!lobby.can_start().await);
    }

    #[tokio::test]
    async fn test_can_start_flips_when_last_member_readies() {
        let lobby = lobby(4);
        lobby.add_member(participant(2), None).await.unwrap();
        lobby.add_member(participant(3), None).await.unwrap();

        lobby.set_ready(&sid(2), true).await.unwrap();
        assert!(!lobby.can_start().await);

        lobby.set_ready(&sid(3), true).await.unwrap();
        assert!(lobby.can_start().await);

        lobby.set_ready(&sid(1), false).await.unwrap();
        assert!(!lobby.can_start().await);
    }

    #[tokio::test]
    async fn test_set_ready_rejects_non_member() {
        let lobby = lobby(4);
        let err = lobby.set_ready(&sid(5), true).await.unwrap_err();
        assert_eq!(err, LobbyError::NotMember(LobbyId(1)));
    }

    // =====================================================================
    // start()
    // =====================================================================

    #[tokio::test]
    async fn test_start_requires_host() {
        let lobby = lobby(4);
        lobby.add_member(participant(2), None).await.unwrap();
        lobby.set_ready(&sid(2), true).await.unwrap();

        assert_eq!(lobby.start(&sid(2), None).await.unwrap_err(), LobbyError::NotHost);
        assert_eq!(lobby.status().await, LobbyStatus::Waiting);
    }

    #[tokio::test]
    async fn test_start_requires_everyone_ready() {
        let lobby = lobby(4);
        lobby.add_member(participant(2), None).await.unwrap();
        assert_eq!(lobby.start(&sid(1), None).await.unwrap_err(), LobbyError::NotReady);
    }

    #[tokio::test]
    async fn test_start_builds_roster_in_join_order() {
        let lobby = lobby(4);
        lobby.add_member(participant(2), None).await.unwrap();
        lobby.set_ready(&sid(2), true).await.unwrap();

        let ticket = lobby.start(&sid(1), None).await.unwrap();

        assert_eq!(ticket.view.status, LobbyStatus::Starting);
        let seats: Vec<_> = ticket.roster.iter().map(|r| (r.seat, r.player_id)).collect();
        assert_eq!(seats, vec![(1, PlayerId(1)), (2, PlayerId(2))]);
        assert_eq!(ticket.sessions, vec![sid(1), sid(2)]);
    }

    #[tokio::test]
    async fn test_start_twice_fails_second_time() {
        let lobby = lobby(4);
        lobby.add_member(participant(2), None).await.unwrap();
        lobby.set_ready(&sid(2), true).await.unwrap();
        lobby.start(&sid(1), None).await.unwrap();

        let err = lobby.start(&sid(1), None).await.unwrap_err();
        assert!(matches!(err, LobbyError::InvalidState { status: LobbyStatus::Starting, .. }));
    }

    #[tokio::test]
    async fn test_start_enforces_map_bounds() {
        let lobby = Lobby::new(LobbyId(1), "T".into(), participant(1), 4, None, Some("big".into()));
        lobby.add_member(participant(2), None).await.unwrap();
        lobby.set_ready(&sid(2), true).await.unwrap();
        let bounds = PlayerCount {
            min: 3,
            max: 6,
            recommended: vec![],
        };

        let err = lobby.start(&sid(1), Some(&bounds)).await.unwrap_err();
        assert_eq!(
            err,
            LobbyError::PlayerCount {
                map_id: "big".into(),
                have: 2,
                min: 3,
                max: 6
            }
        );
    }

    #[tokio::test]
    async fn test_abort_start_returns_to_waiting_unready() {
        let lobby = lobby(4);
        lobby.add_member(participant(2), None).await.unwrap();
        lobby.set_ready(&sid(2), true).await.unwrap();
        lobby.start(&sid(1), None).await.unwrap();

        let view = lobby.abort_start("engine unavailable").await.unwrap();

        assert_eq!(view.status, LobbyStatus::Waiting);
        assert!(view.members.iter().all(|m| !m.is_ready));
    }

    #[tokio::test]
    async fn test_mark_in_game_records_game_id() {
        let lobby = lobby(4);
        lobby.add_member(participant(2), None).await.unwrap();
        lobby.set_ready(&sid(2), true).await.unwrap();
        lobby.start(&sid(1), None).await.unwrap();

        let view = lobby.mark_in_game("G-1".into()).await.unwrap();
        assert_eq!(view.status, LobbyStatus::InGame);
        assert_eq!(view.game_id.as_deref(), Some("G-1"));
    }

    // =====================================================================
    // add_message() / views
    // =====================================================================

    #[tokio::test]
    async fn test_add_message_from_member() {
        let lobby = lobby(4);
        let msg = lobby.add_message(&sid(1), "hello".into()).await.unwrap();
        assert_eq!(msg.kind, MessageKind::Chat);
        assert_eq!(msg.player_id, Some(PlayerId(1)));
        assert_eq!(msg.text, "hello");

        let view = lobby.view().await;
        let ids: Vec<u64> = view.messages.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_add_message_from_non_member_is_dropped() {
        let lobby = lobby(4);
        let before = lobby.view().await.messages.len();
        assert!(lobby.add_message(&sid(7), "spam".into()).await.is_none());
        assert_eq!(lobby.view().await.messages.len(), before);
    }

    #[tokio::test]
    async fn test_summary_omits_roster() {
        let lobby = Lobby::new(LobbyId(4), "Sum".into(), participant(1), 3, Some("pw".into()), None);
        let summary = lobby.summary().await;
        assert_eq!(summary.lobby_id, LobbyId(4));
        assert_eq!(summary.player_count, 1);
        assert_eq!(summary.max_players, 3);
        assert!(summary.has_password);
    }

    #[tokio::test]
    async fn test_revision_increases_on_every_change() {
        let lobby = lobby(4);
        let r0 = lobby.view().await.revision;
        let r1 = lobby.add_member(participant(2), None).await.unwrap().revision;
        let r2 = lobby.set_ready(&sid(2), true).await.unwrap().revision;
        assert!(r0 < r1 && r1 < r2);
    }
}
