//! Core player implementation
//!
//! The Player owns the current track, the queue, liked songs and the single
//! engine session, and publishes a snapshot to its observers after every
//! change. It is driven from one task at a time; see `service` for the async
//! wrapper that feeds it commands, engine events and progress ticks.

use std::time::Duration;

use thiserror::Error;

use crate::engine::{ EngineError, EngineEvent, PlaybackEngine, Session, SessionId };
use crate::liked::LikedSongs;
use crate::observer::{ ObserverList, PlayerSnapshot, PlayerStatus, StateObserver };
use crate::queue::Queue;
use crate::track::{ PlaylistId, Track, TrackId };


/// Catalog lookup that came back empty.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub enum Lookup {
    Track( TrackId ),
    Playlist( PlaylistId ),
}


/// Conditions the player absorbs. None of them are fatal.
#[derive( Debug, Clone, Error, PartialEq )]
pub enum PlayerError {
    #[error( "Failed to load track {track}: {source}" )]
    EngineLoad {
        track: TrackId,
        #[source]
        source: EngineError,
    },

    #[error( "Not found: {0:?}" )]
    NotFound( Lookup ),

    #[error( "Ignored event from stale session {0}" )]
    StaleCallback( SessionId ),

    #[error( "Ignored: {0}" )]
    InvariantViolation( &'static str ),
}


/// Player settings.
#[derive( Debug, Clone, Copy, PartialEq )]
pub struct PlayerConfig {
    /// Volume applied to every new session (0.0 to 1.0).
    pub initial_volume: f32,
    /// How often the position is polled while playing.
    pub tick_interval: Duration,
}


impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            initial_volume: 1.0,
            tick_interval: Duration::from_secs( 1 ),
        }
    }
}


/// Engine session slot. At most one session is pending or live.
#[derive( Debug )]
enum SessionSlot {
    Empty,
    Pending( SessionId ),
    Live {
        id: SessionId,
        session: Box<dyn Session>,
    },
}


/// Playback state core.
pub struct Player {
    engine: Box<dyn PlaybackEngine>,
    observers: ObserverList,
    config: PlayerConfig,
    slot: SessionSlot,
    last_session: u64,
    current_track: Option<Track>,
    /// While loading, whether the track starts playing when it arrives.
    is_playing: bool,
    position_secs: f64,
    repeat_one: bool,
    volume: f32,
    queue: Queue,
    liked: LikedSongs,
}


impl Player {
    /// Creates an idle player driving the given engine.
    pub fn new( engine: Box<dyn PlaybackEngine>, config: PlayerConfig ) -> Self {
        Self {
            engine,
            observers: ObserverList::default(),
            config,
            slot: SessionSlot::Empty,
            last_session: 0,
            current_track: None,
            is_playing: false,
            position_secs: 0.0,
            repeat_one: false,
            volume: config.initial_volume.clamp( 0.0, 1.0 ),
            queue: Queue::new(),
            liked: LikedSongs::new(),
        }
    }


    /// Registers an observer. It receives the current snapshot immediately.
    pub fn subscribe( &mut self, mut observer: Box<dyn StateObserver> ) {
        observer.on_state_changed( &self.snapshot() );
        self.observers.push( observer );
    }


    /// Loads and starts a track, replacing the current one.
    ///
    /// Loading the track that is already current does nothing.
    pub fn load_track( &mut self, track: Track ) {
        if self.current_track.as_ref().map( |t| t.id ) == Some( track.id ) {
            tracing::debug!( "Track {} already loaded", track.id );
            return;
        }
        self.start_session( track );
    }


    /// Replaces the queue and starts its first track.
    ///
    /// An empty list leaves everything as it was.
    pub fn load_playlist( &mut self, tracks: Vec<Track> ) {
        let Some( first ) = tracks.first().cloned() else {
            tracing::debug!( "Ignoring empty playlist" );
            return;
        };

        tracing::info!( "Queue replaced with {} tracks", tracks.len() );
        self.queue.replace( tracks );

        if self.current_track.as_ref().map( |t| t.id ) == Some( first.id ) {
            self.publish();
        } else {
            self.start_session( first );
        }
    }


    /// Toggles between playing and paused.
    pub fn toggle_play_pause( &mut self ) {
        if self.current_track.is_none() {
            self.ignore( "toggle play/pause without a track" );
            return;
        }

        match &mut self.slot {
            SessionSlot::Live { session, .. } => {
                if self.is_playing {
                    session.pause();
                    tracing::info!( "Paused" );
                } else {
                    session.play();
                    tracing::info!( "Resumed" );
                }
            }
            SessionSlot::Pending( _ ) => {
                tracing::debug!( "Play on load: {}", !self.is_playing );
            }
            SessionSlot::Empty => return,
        }
        self.is_playing = !self.is_playing;

        self.publish();
    }


    /// Seeks to a fraction (0.0 to 1.0) of the current track.
    ///
    /// The displayed position changes at once. While loading, the position is
    /// kept and applied when the session arrives.
    pub fn seek( &mut self, fraction: f64 ) {
        let Some( track ) = &self.current_track else {
            self.ignore( "seek without a track" );
            return;
        };
        let duration = track.duration();
        if duration <= 0.0 {
            self.ignore( "seek on a track without duration" );
            return;
        }

        let fraction = if fraction.is_nan() { 0.0 } else { fraction.clamp( 0.0, 1.0 ) };
        let position = fraction * duration;

        if let SessionSlot::Live { session, .. } = &mut self.slot {
            session.seek_to( position );
        }
        self.position_secs = position;
        tracing::debug!( "Seek to {:.1}s", position );

        self.publish();
    }


    /// Loads the queued track after the current one, wrapping to the start.
    pub fn play_next( &mut self ) {
        let current = self.current_track_id();
        match self.queue.next_after( current ).cloned() {
            Some( next ) => self.load_track( next ),
            None => self.ignore( "next on an empty queue" ),
        }
    }


    /// Loads the queued track before the current one, wrapping to the end.
    pub fn play_previous( &mut self ) {
        let current = self.current_track_id();
        match self.queue.previous_before( current ).cloned() {
            Some( previous ) => self.load_track( previous ),
            None => self.ignore( "previous on an empty queue" ),
        }
    }


    /// Randomly reorders the queue. The current track keeps playing.
    pub fn shuffle_queue( &mut self ) {
        self.queue.shuffle();
        tracing::info!( "Queue shuffled" );
        self.publish();
    }


    /// Flips repeat-one.
    pub fn toggle_repeat_one( &mut self ) {
        self.repeat_one = !self.repeat_one;
        tracing::info!( "Repeat one: {}", self.repeat_one );
        self.publish();
    }


    /// Likes the current track.
    pub fn add_to_liked_songs( &mut self ) {
        let Some( id ) = self.current_track_id() else {
            self.ignore( "like without a track" );
            return;
        };
        if self.liked.insert( id ) {
            tracing::info!( "Liked track {}", id );
            self.publish();
        }
    }


    /// Unlikes a track.
    pub fn remove_from_liked_songs( &mut self, id: TrackId ) {
        if self.liked.remove( id ) {
            tracing::info!( "Unliked track {}", id );
            self.publish();
        }
    }


    /// Appends a track to the queue unless it is already queued.
    pub fn add_to_queue( &mut self, track: Track ) {
        let id = track.id;
        if self.queue.push_unique( track ) {
            tracing::info!( "Queued track {}", id );
            self.publish();
        } else {
            tracing::debug!( "Track {} already queued", id );
        }
    }


    /// Sets the volume level (0.0 to 1.0), kept across track changes.
    pub fn set_volume( &mut self, volume: f32 ) {
        let volume = if volume.is_nan() { 0.0 } else { volume.clamp( 0.0, 1.0 ) };
        self.volume = volume;
        if let SessionSlot::Live { session, .. } = &mut self.slot {
            session.set_volume( volume );
        }
        self.publish();
    }


    /// Polls the engine position. Does nothing unless playing.
    pub fn tick( &mut self ) {
        if !self.is_playing {
            return;
        }
        let SessionSlot::Live { session, .. } = &self.slot else {
            return;
        };

        let position = session.position_secs();
        if !position.is_finite() {
            return;
        }
        let duration = self.current_track.as_ref().map( Track::duration ).unwrap_or( 0.0 );
        self.position_secs = position.clamp( 0.0, duration );

        self.publish();
    }


    /// Applies an engine notification, discarding those from stale sessions.
    pub fn handle_engine_event( &mut self, event: EngineEvent ) {
        tracing::trace!( "Engine event for session {}", event.session() );
        match event {
            EngineEvent::Loaded { session, result } => self.on_loaded( session, result ),
            EngineEvent::Completed { session } => self.on_completed( session ),
        }
    }


    /// Reports a catalog miss. Playback is left alone.
    pub fn report_not_found( &mut self, lookup: Lookup ) {
        let error = PlayerError::NotFound( lookup );
        tracing::warn!( "{}", error );
        self.observers.report( &error );
    }


    /// Releases the session and returns to idle.
    pub fn teardown( &mut self ) {
        self.release_session();
        self.slot = SessionSlot::Empty;
        self.current_track = None;
        self.position_secs = 0.0;
        tracing::info!( "Player torn down" );
        self.publish();
    }


    /// Builds a snapshot of the current state.
    pub fn snapshot( &self ) -> PlayerSnapshot {
        PlayerSnapshot {
            status: self.status(),
            current_track: self.current_track.clone(),
            is_playing: self.is_playing,
            progress_fraction: self.progress_fraction(),
            position_secs: self.position_secs,
            repeat_one: self.repeat_one,
            volume: self.volume,
            queue: self.queue.tracks().to_vec(),
            liked_track_ids: self.liked.ids().to_vec(),
        }
    }


    pub fn status( &self ) -> PlayerStatus {
        match self.slot {
            SessionSlot::Empty => PlayerStatus::Idle,
            SessionSlot::Pending( _ ) => PlayerStatus::Loading,
            SessionSlot::Live { .. } if self.is_playing => PlayerStatus::Playing,
            SessionSlot::Live { .. } => PlayerStatus::Paused,
        }
    }


    pub fn current_track( &self ) -> Option<&Track> {
        self.current_track.as_ref()
    }


    pub fn is_playing( &self ) -> bool {
        self.is_playing
    }


    pub fn position_secs( &self ) -> f64 {
        self.position_secs
    }


    /// Position as a fraction of the duration, 0 without a timed track.
    pub fn progress_fraction( &self ) -> f64 {
        match &self.current_track {
            Some( track ) if track.duration_secs > 0 => {
                ( self.position_secs / track.duration() ).clamp( 0.0, 1.0 )
            }
            _ => 0.0,
        }
    }


    pub fn repeat_one( &self ) -> bool {
        self.repeat_one
    }


    pub fn volume( &self ) -> f32 {
        self.volume
    }


    pub fn queue( &self ) -> &Queue {
        &self.queue
    }


    pub fn liked( &self ) -> &LikedSongs {
        &self.liked
    }


    pub fn config( &self ) -> &PlayerConfig {
        &self.config
    }


    /// True while the position should be polled.
    pub fn needs_ticks( &self ) -> bool {
        self.is_playing && matches!( self.slot, SessionSlot::Live { .. } )
    }


    fn current_track_id( &self ) -> Option<TrackId> {
        self.current_track.as_ref().map( |t| t.id )
    }


    /// Releases any session and requests a new one for `track`.
    fn start_session( &mut self, track: Track ) {
        self.release_session();

        self.last_session += 1;
        let id = SessionId( self.last_session );
        tracing::info!( "Loading {} ({}) as session {}", track.display_name(), track.id, id );

        self.engine.create_session( id, &track.audio_url );
        self.slot = SessionSlot::Pending( id );
        self.current_track = Some( track );
        self.is_playing = true;
        self.position_secs = 0.0;

        self.publish();
    }


    fn release_session( &mut self ) {
        if let Some( id ) = self.current_track_id() {
            if self.position_secs > 0.0 {
                self.queue.remember_position( id, self.position_secs );
            }
        }

        if let SessionSlot::Live { id, mut session } = std::mem::replace( &mut self.slot, SessionSlot::Empty ) {
            session.release();
            tracing::debug!( "Released session {}", id );
        }
        self.is_playing = false;
    }


    fn on_loaded( &mut self, id: SessionId, result: Result<Box<dyn Session>, EngineError> ) {
        if !matches!( self.slot, SessionSlot::Pending( pending ) if pending == id ) {
            self.discard_stale( id );
            if let Ok( mut orphan ) = result {
                orphan.release();
            }
            return;
        }

        match result {
            Ok( mut session ) => {
                session.set_volume( self.volume );
                if self.position_secs > 0.0 {
                    session.seek_to( self.position_secs );
                }
                if self.is_playing {
                    session.play();
                }
                self.slot = SessionSlot::Live { id, session };
                tracing::info!( "Session {} ready", id );
            }
            Err( source ) => {
                self.slot = SessionSlot::Empty;
                self.is_playing = false;
                self.position_secs = 0.0;
                if let Some( track ) = self.current_track.take() {
                    let error = PlayerError::EngineLoad { track: track.id, source };
                    tracing::error!( "{}", error );
                    self.observers.report( &error );
                }
            }
        }

        self.publish();
    }


    fn on_completed( &mut self, id: SessionId ) {
        if !matches!( &self.slot, SessionSlot::Live { id: live, .. } if *live == id ) {
            self.discard_stale( id );
            return;
        }
        let Some( current ) = self.current_track.clone() else {
            return;
        };

        if self.repeat_one {
            tracing::info!( "Repeating {}", current.id );
            self.start_session( current );
            return;
        }

        // The successor may be the current track itself in a one-track queue;
        // start_session restarts it either way.
        match self.queue.next_after( Some( current.id ) ).cloned() {
            Some( next ) => self.start_session( next ),
            None => {
                tracing::info!( "Playback finished" );
                self.release_session();
                self.current_track = None;
                self.position_secs = 0.0;
                self.publish();
            }
        }
    }


    fn discard_stale( &self, id: SessionId ) {
        tracing::debug!( "{}", PlayerError::StaleCallback( id ) );
    }


    fn ignore( &self, what: &'static str ) {
        tracing::debug!( "{}", PlayerError::InvariantViolation( what ) );
    }


    fn publish( &mut self ) {
        if self.observers.is_empty() {
            return;
        }
        let snapshot = self.snapshot();
        self.observers.publish( &snapshot );
    }
}


impl Drop for Player {
    fn drop( &mut self ) {
        // Make sure no audio outlives the player
        self.release_session();
    }
}


#[cfg( test )]
mod tests {
    use super::*;
    use crate::observer::ChannelObserver;
    use crate::observer::PlayerEvent;
    use crate::testing::{ MockEngine, SessionCall, SharedLog };


    fn track( id: u64, duration: u32 ) -> Track {
        Track::new( id, format!( "Track {}", id ), "Artist", duration, format!( "https://cdn/{}.mp3", id ) )
    }


    fn player() -> ( Player, SharedLog ) {
        let ( engine, log ) = MockEngine::manual();
        ( Player::new( Box::new( engine ), PlayerConfig::default() ), log )
    }


    /// Answers the most recent session request successfully.
    fn finish_loading( player: &mut Player, log: &SharedLog ) -> SessionId {
        let id = log.lock().unwrap().last_created().expect( "no session requested" );
        player.handle_engine_event( EngineEvent::Loaded {
            session: id,
            result: Ok( crate::testing::MockSession::boxed( id, log ) ),
        });
        id
    }


    fn complete( player: &mut Player, id: SessionId ) {
        player.handle_engine_event( EngineEvent::Completed { session: id } );
    }


    fn current_id( player: &Player ) -> Option<u64> {
        player.current_track().map( |t| t.id.0 )
    }


    #[test]
    fn test_new_player_is_idle() {
        let ( player, _ ) = player();
        let snapshot = player.snapshot();
        assert_eq!( snapshot.status, PlayerStatus::Idle );
        assert!( snapshot.current_track.is_none() );
        assert!( !snapshot.is_playing );
        assert_eq!( snapshot.progress_fraction, 0.0 );
    }


    #[test]
    fn test_load_track_goes_through_loading_to_playing() {
        let ( mut player, log ) = player();
        player.load_track( track( 1, 30 ) );

        assert_eq!( player.status(), PlayerStatus::Loading );
        assert_eq!( current_id( &player ), Some( 1 ) );
        assert!( player.is_playing() );
        assert!( !player.needs_ticks() );

        let id = finish_loading( &mut player, &log );
        assert_eq!( player.status(), PlayerStatus::Playing );
        assert!( player.is_playing() );

        let calls = log.lock().unwrap().calls_for( id );
        assert_eq!( calls, vec![ SessionCall::SetVolume( 1.0 ), SessionCall::Play ] );
    }


    #[test]
    fn test_reloading_same_track_creates_one_session() {
        let ( mut player, log ) = player();
        player.load_track( track( 1, 30 ) );
        player.load_track( track( 1, 30 ) );
        assert_eq!( log.lock().unwrap().created.len(), 1 );

        finish_loading( &mut player, &log );
        player.load_track( track( 1, 30 ) );
        assert_eq!( log.lock().unwrap().created.len(), 1 );
    }


    #[test]
    fn test_loading_new_track_releases_previous_session() {
        let ( mut player, log ) = player();
        player.load_track( track( 1, 30 ) );
        let first = finish_loading( &mut player, &log );

        player.load_track( track( 2, 30 ) );
        let calls = log.lock().unwrap().calls_for( first );
        assert_eq!( calls.last(), Some( &SessionCall::Release ) );
        assert_eq!( player.position_secs(), 0.0 );
        assert_eq!( player.status(), PlayerStatus::Loading );
    }


    #[test]
    fn test_engine_failure_returns_to_idle_and_reports() {
        let ( mut player, log ) = player();
        let ( observer, mut events ) = ChannelObserver::new();
        player.subscribe( Box::new( observer ) );

        player.load_track( track( 1, 30 ) );
        let id = log.lock().unwrap().last_created().unwrap();
        player.handle_engine_event( EngineEvent::Loaded {
            session: id,
            result: Err( EngineError::Fetch( "404".into() ) ),
        });

        assert_eq!( player.status(), PlayerStatus::Idle );
        assert!( player.current_track().is_none() );
        assert!( !player.is_playing() );

        let mut reported = None;
        while let Ok( event ) = events.try_recv() {
            if let PlayerEvent::Report( error ) = event {
                reported = Some( error );
            }
        }
        assert!( matches!( reported, Some( PlayerError::EngineLoad { track: TrackId( 1 ), .. } ) ) );
    }


    #[test]
    fn test_load_playlist_starts_first_track() {
        let ( mut player, log ) = player();
        player.load_playlist( vec![ track( 1, 10 ), track( 2, 20 ) ] );
        assert_eq!( current_id( &player ), Some( 1 ) );
        assert_eq!( player.queue().len(), 2 );
        assert_eq!( log.lock().unwrap().created.len(), 1 );
    }


    #[test]
    fn test_load_empty_playlist_changes_nothing() {
        let ( mut player, log ) = player();
        player.load_playlist( vec![ track( 1, 10 ), track( 2, 20 ) ] );
        finish_loading( &mut player, &log );
        let before = player.snapshot();

        player.load_playlist( Vec::new() );

        let after = player.snapshot();
        assert_eq!( after.current_track, before.current_track );
        assert_eq!( after.queue, before.queue );
        assert_eq!( log.lock().unwrap().created.len(), 1 );
    }


    #[test]
    fn test_toggle_play_pause() {
        let ( mut player, log ) = player();
        player.toggle_play_pause();
        assert!( !player.is_playing() );

        player.load_track( track( 1, 30 ) );
        let id = finish_loading( &mut player, &log );

        player.toggle_play_pause();
        assert!( !player.is_playing() );
        assert_eq!( player.status(), PlayerStatus::Paused );
        player.toggle_play_pause();
        assert!( player.is_playing() );

        let calls = log.lock().unwrap().calls_for( id );
        assert_eq!( &calls[ calls.len() - 2.. ], &[ SessionCall::Pause, SessionCall::Play ] );
    }


    #[test]
    fn test_pause_while_loading_starts_paused() {
        let ( mut player, log ) = player();
        player.load_track( track( 1, 30 ) );
        player.toggle_play_pause();
        let id = finish_loading( &mut player, &log );

        assert_eq!( player.status(), PlayerStatus::Paused );
        assert!( !log.lock().unwrap().calls_for( id ).contains( &SessionCall::Play ) );
    }


    #[test]
    fn test_toggle_while_loading_is_published() {
        let ( mut player, _log ) = player();
        let ( observer, mut events ) = ChannelObserver::new();
        player.subscribe( Box::new( observer ) );

        let mut last_snapshot = || {
            let mut last = None;
            while let Ok( event ) = events.try_recv() {
                if let PlayerEvent::StateChanged( snapshot ) = event {
                    last = Some( snapshot );
                }
            }
            last.expect( "no snapshot published" )
        };

        player.load_track( track( 1, 30 ) );
        let before = last_snapshot();
        assert_eq!( before.status, PlayerStatus::Loading );
        assert!( before.is_playing );

        player.toggle_play_pause();
        let after = last_snapshot();
        assert_ne!( before, after );
        assert_eq!( after.status, PlayerStatus::Loading );
        assert!( !after.is_playing );

        player.toggle_play_pause();
        assert!( last_snapshot().is_playing );
    }


    #[test]
    fn test_seek_half_way() {
        let ( mut player, log ) = player();
        player.load_track( track( 1, 200 ) );
        let id = finish_loading( &mut player, &log );

        player.seek( 0.5 );
        assert_eq!( player.position_secs(), 100.0 );
        assert_eq!( player.progress_fraction(), 0.5 );
        assert!( log.lock().unwrap().calls_for( id ).contains( &SessionCall::SeekTo( 100.0 ) ) );
    }


    #[test]
    fn test_seek_clamps_fraction() {
        let ( mut player, log ) = player();
        player.load_track( track( 1, 200 ) );
        finish_loading( &mut player, &log );

        player.seek( 1.7 );
        assert_eq!( player.position_secs(), 200.0 );
        player.seek( -0.2 );
        assert_eq!( player.position_secs(), 0.0 );
    }


    #[test]
    fn test_seek_without_track_or_duration_is_ignored() {
        let ( mut player, log ) = player();
        player.seek( 0.5 );
        assert_eq!( player.position_secs(), 0.0 );

        player.load_track( track( 1, 0 ) );
        finish_loading( &mut player, &log );
        player.seek( 0.5 );
        assert_eq!( player.position_secs(), 0.0 );
        assert_eq!( player.progress_fraction(), 0.0 );
    }


    #[test]
    fn test_seek_while_loading_applies_on_ready() {
        let ( mut player, log ) = player();
        player.load_track( track( 1, 100 ) );
        player.seek( 0.25 );
        assert_eq!( player.position_secs(), 25.0 );

        let id = finish_loading( &mut player, &log );
        assert!( log.lock().unwrap().calls_for( id ).contains( &SessionCall::SeekTo( 25.0 ) ) );
        assert_eq!( player.position_secs(), 25.0 );
    }


    #[test]
    fn test_play_next_wraps_around_queue() {
        let ( mut player, _log ) = player();
        let tracks: Vec<Track> = ( 1..=4 ).map( |id| track( id, 10 ) ).collect();
        player.load_playlist( tracks.clone() );

        for _ in 0..tracks.len() {
            player.play_next();
        }
        assert_eq!( current_id( &player ), Some( 1 ) );
    }


    #[test]
    fn test_play_previous_undoes_play_next() {
        let ( mut player, _log ) = player();
        player.load_playlist( vec![ track( 1, 10 ), track( 2, 10 ), track( 3, 10 ) ] );

        player.play_next();
        assert_eq!( current_id( &player ), Some( 2 ) );
        player.play_previous();
        assert_eq!( current_id( &player ), Some( 1 ) );

        player.play_previous();
        assert_eq!( current_id( &player ), Some( 3 ) );
        player.play_next();
        assert_eq!( current_id( &player ), Some( 1 ) );
    }


    #[test]
    fn test_navigation_on_empty_queue_is_ignored() {
        let ( mut player, log ) = player();
        player.play_next();
        player.play_previous();
        assert!( player.current_track().is_none() );
        assert!( log.lock().unwrap().created.is_empty() );
    }


    #[test]
    fn test_play_next_from_track_outside_queue_starts_at_first() {
        let ( mut player, _log ) = player();
        player.load_playlist( vec![ track( 1, 10 ), track( 2, 10 ) ] );
        player.load_track( track( 9, 10 ) );

        player.play_next();
        assert_eq!( current_id( &player ), Some( 1 ) );
    }


    #[test]
    fn test_shuffle_keeps_tracks_and_current() {
        let ( mut player, log ) = player();
        let tracks: Vec<Track> = ( 1..=10 ).map( |id| track( id, 10 ) ).collect();
        player.load_playlist( tracks );
        finish_loading( &mut player, &log );

        player.shuffle_queue();

        let mut ids: Vec<u64> = player.queue().tracks().iter().map( |t| t.id.0 ).collect();
        ids.sort_unstable();
        assert_eq!( ids, ( 1..=10 ).collect::<Vec<_>>() );
        assert_eq!( current_id( &player ), Some( 1 ) );
        assert_eq!( player.status(), PlayerStatus::Playing );
        assert_eq!( log.lock().unwrap().created.len(), 1 );
    }


    #[test]
    fn test_like_twice_keeps_one_entry() {
        let ( mut player, _log ) = player();
        player.add_to_liked_songs();
        assert!( player.liked().is_empty() );

        player.load_track( track( 3, 10 ) );
        player.add_to_liked_songs();
        player.add_to_liked_songs();
        assert_eq!( player.liked().ids(), &[ TrackId( 3 ) ] );

        player.remove_from_liked_songs( TrackId( 3 ) );
        player.remove_from_liked_songs( TrackId( 3 ) );
        assert!( player.liked().is_empty() );
    }


    #[test]
    fn test_add_to_queue_is_idempotent() {
        let ( mut player, _log ) = player();
        player.add_to_queue( track( 1, 10 ) );
        player.add_to_queue( track( 1, 10 ) );
        player.add_to_queue( track( 2, 10 ) );
        assert_eq!( player.queue().len(), 2 );
        assert!( player.current_track().is_none() );
    }


    #[test]
    fn test_completion_advances_and_wraps() {
        let ( mut player, log ) = player();
        player.load_playlist( vec![ track( 1, 10 ), track( 2, 20 ) ] );
        let a = finish_loading( &mut player, &log );

        complete( &mut player, a );
        assert_eq!( current_id( &player ), Some( 2 ) );

        let b = finish_loading( &mut player, &log );
        complete( &mut player, b );
        assert_eq!( current_id( &player ), Some( 1 ) );
    }


    #[test]
    fn test_completion_with_repeat_one_restarts_track() {
        let ( mut player, log ) = player();
        player.load_playlist( vec![ track( 1, 10 ), track( 2, 20 ) ] );
        let a = finish_loading( &mut player, &log );
        player.toggle_repeat_one();

        log.lock().unwrap().position_secs = 9.0;
        player.tick();
        assert_eq!( player.position_secs(), 9.0 );

        complete( &mut player, a );
        assert_eq!( current_id( &player ), Some( 1 ) );
        assert_eq!( player.position_secs(), 0.0 );
        assert_eq!( log.lock().unwrap().created.len(), 2 );
    }


    #[test]
    fn test_completion_in_single_track_queue_restarts() {
        let ( mut player, log ) = player();
        player.load_playlist( vec![ track( 1, 10 ) ] );
        let a = finish_loading( &mut player, &log );

        complete( &mut player, a );
        assert_eq!( current_id( &player ), Some( 1 ) );
        assert_eq!( player.status(), PlayerStatus::Loading );
        assert_eq!( log.lock().unwrap().created.len(), 2 );
    }


    #[test]
    fn test_completion_without_queue_goes_idle() {
        let ( mut player, log ) = player();
        player.load_track( track( 1, 10 ) );
        let a = finish_loading( &mut player, &log );

        complete( &mut player, a );
        assert_eq!( player.status(), PlayerStatus::Idle );
        assert!( player.current_track().is_none() );
        assert_eq!( log.lock().unwrap().calls_for( a ).last(), Some( &SessionCall::Release ) );
    }


    #[test]
    fn test_stale_completion_is_ignored() {
        let ( mut player, log ) = player();
        player.load_playlist( vec![ track( 1, 10 ), track( 2, 20 ), track( 3, 30 ) ] );
        let a = finish_loading( &mut player, &log );

        player.load_track( track( 3, 30 ) );
        finish_loading( &mut player, &log );

        complete( &mut player, a );
        assert_eq!( current_id( &player ), Some( 3 ) );
        assert_eq!( player.status(), PlayerStatus::Playing );
        assert_eq!( log.lock().unwrap().created.len(), 2 );
    }


    #[test]
    fn test_late_load_of_abandoned_session_is_released() {
        let ( mut player, log ) = player();
        player.load_track( track( 1, 10 ) );
        let abandoned = log.lock().unwrap().last_created().unwrap();
        player.load_track( track( 2, 10 ) );

        player.handle_engine_event( EngineEvent::Loaded {
            session: abandoned,
            result: Ok( crate::testing::MockSession::boxed( abandoned, &log ) ),
        });

        assert_eq!( current_id( &player ), Some( 2 ) );
        assert_eq!( player.status(), PlayerStatus::Loading );
        assert_eq!( log.lock().unwrap().calls_for( abandoned ), vec![ SessionCall::Release ] );
    }


    #[test]
    fn test_late_failure_of_abandoned_session_is_ignored() {
        let ( mut player, log ) = player();
        player.load_track( track( 1, 10 ) );
        let abandoned = log.lock().unwrap().last_created().unwrap();
        player.load_track( track( 2, 10 ) );
        finish_loading( &mut player, &log );

        player.handle_engine_event( EngineEvent::Loaded {
            session: abandoned,
            result: Err( EngineError::Output( "device lost".into() ) ),
        });
        assert_eq!( current_id( &player ), Some( 2 ) );
        assert_eq!( player.status(), PlayerStatus::Playing );
    }


    #[test]
    fn test_tick_updates_position_only_while_playing() {
        let ( mut player, log ) = player();
        player.load_track( track( 1, 20 ) );
        log.lock().unwrap().position_secs = 5.0;
        player.tick();
        assert_eq!( player.position_secs(), 0.0 );

        finish_loading( &mut player, &log );
        assert!( player.needs_ticks() );
        player.tick();
        assert_eq!( player.position_secs(), 5.0 );
        assert_eq!( player.progress_fraction(), 0.25 );

        player.toggle_play_pause();
        assert!( !player.needs_ticks() );
        log.lock().unwrap().position_secs = 8.0;
        player.tick();
        assert_eq!( player.position_secs(), 5.0 );
    }


    #[test]
    fn test_volume_is_clamped_and_carried_to_new_sessions() {
        let ( mut player, log ) = player();
        player.set_volume( 3.0 );
        assert_eq!( player.volume(), 1.0 );
        player.set_volume( 0.4 );

        player.load_track( track( 1, 10 ) );
        let id = finish_loading( &mut player, &log );
        assert_eq!( log.lock().unwrap().calls_for( id )[ 0 ], SessionCall::SetVolume( 0.4 ) );
    }


    #[test]
    fn test_position_remembered_on_track_change() {
        let ( mut player, log ) = player();
        player.load_playlist( vec![ track( 1, 10 ), track( 2, 10 ) ] );
        finish_loading( &mut player, &log );
        player.seek( 0.5 );

        player.play_next();
        assert_eq!( player.queue().get( 0 ).and_then( |t| t.last_position_secs ), Some( 5.0 ) );
    }


    #[test]
    fn test_not_found_is_reported_without_touching_playback() {
        let ( mut player, log ) = player();
        let ( observer, mut events ) = ChannelObserver::new();
        player.subscribe( Box::new( observer ) );
        player.load_track( track( 1, 10 ) );
        finish_loading( &mut player, &log );
        while events.try_recv().is_ok() {}

        player.report_not_found( Lookup::Track( TrackId( 42 ) ) );

        assert_eq!( current_id( &player ), Some( 1 ) );
        assert!( matches!(
            events.try_recv(),
            Ok( PlayerEvent::Report( PlayerError::NotFound( Lookup::Track( TrackId( 42 ) ) ) ) )
        ));
        assert!( events.try_recv().is_err() );
    }


    #[test]
    fn test_teardown_releases_session() {
        let ( mut player, log ) = player();
        player.load_track( track( 1, 10 ) );
        let id = finish_loading( &mut player, &log );

        player.teardown();
        assert_eq!( player.status(), PlayerStatus::Idle );
        assert!( player.current_track().is_none() );
        assert_eq!( log.lock().unwrap().calls_for( id ).last(), Some( &SessionCall::Release ) );
    }


    #[test]
    fn test_observers_get_snapshot_per_change() {
        let ( mut player, log ) = player();
        let ( observer, mut events ) = ChannelObserver::new();
        player.subscribe( Box::new( observer ) );

        player.load_track( track( 1, 10 ) );
        finish_loading( &mut player, &log );

        let statuses: Vec<PlayerStatus> = std::iter::from_fn( || events.try_recv().ok() )
            .filter_map( |event| match event {
                PlayerEvent::StateChanged( s ) => Some( s.status ),
                PlayerEvent::Report( _ ) => None,
            })
            .collect();
        assert_eq!( statuses, vec![ PlayerStatus::Idle, PlayerStatus::Loading, PlayerStatus::Playing ] );
    }
}
