//! Async front door to the player.
//!
//! The service task owns the [`Player`] and handles one message at a time:
//! inbound requests, engine events and progress ticks never interleave. The
//! progress timer only exists while something is playing.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{ mpsc, watch };
use tokio::task::JoinHandle;
use tokio::time::{ self, Instant, Interval, MissedTickBehavior };

use crate::catalog::Catalog;
use crate::engine::EngineEventReceiver;
use crate::observer::{ PlayerSnapshot, WatchObserver };
use crate::player::{ Lookup, Player };
use crate::track::{ PlaylistId, Track, TrackId };


/// Shortest progress interval accepted.
const MIN_TICK_INTERVAL: Duration = Duration::from_millis( 50 );


/// Errors returned by [`PlayerHandle`].
#[derive( Debug, Error )]
pub enum ServiceError {
    #[error( "Player service has stopped" )]
    Stopped,
}


/// Inbound commands.
#[derive( Debug, Clone, PartialEq )]
pub enum PlayerRequest {
    LoadTrackById( TrackId ),
    LoadPlaylistById( PlaylistId ),
    /// Replace the queue with already resolved tracks and start the first.
    LoadTracks( Vec<Track> ),
    TogglePlayPause,
    Seek( f64 ),
    PlayNext,
    PlayPrevious,
    ShuffleQueue,
    ToggleRepeatOne,
    AddToLikedSongs,
    RemoveFromLikedSongs( TrackId ),
    AddToQueue( Track ),
    AddToQueueById( TrackId ),
    SetVolume( f32 ),
    Shutdown,
}


/// Cloneable sender for [`PlayerRequest`]s. Sending never blocks.
#[derive( Debug, Clone )]
pub struct PlayerHandle {
    tx: mpsc::UnboundedSender<PlayerRequest>,
}


impl PlayerHandle {
    pub fn send( &self, request: PlayerRequest ) -> Result<(), ServiceError> {
        self.tx.send( request ).map_err( |_| ServiceError::Stopped )
    }


    pub fn load_track_by_id( &self, id: TrackId ) -> Result<(), ServiceError> {
        self.send( PlayerRequest::LoadTrackById( id ) )
    }


    pub fn load_playlist_by_id( &self, id: PlaylistId ) -> Result<(), ServiceError> {
        self.send( PlayerRequest::LoadPlaylistById( id ) )
    }


    pub fn load_tracks( &self, tracks: Vec<Track> ) -> Result<(), ServiceError> {
        self.send( PlayerRequest::LoadTracks( tracks ) )
    }


    pub fn toggle_play_pause( &self ) -> Result<(), ServiceError> {
        self.send( PlayerRequest::TogglePlayPause )
    }


    pub fn seek( &self, fraction: f64 ) -> Result<(), ServiceError> {
        self.send( PlayerRequest::Seek( fraction ) )
    }


    pub fn play_next( &self ) -> Result<(), ServiceError> {
        self.send( PlayerRequest::PlayNext )
    }


    pub fn play_previous( &self ) -> Result<(), ServiceError> {
        self.send( PlayerRequest::PlayPrevious )
    }


    pub fn shuffle_queue( &self ) -> Result<(), ServiceError> {
        self.send( PlayerRequest::ShuffleQueue )
    }


    pub fn toggle_repeat_one( &self ) -> Result<(), ServiceError> {
        self.send( PlayerRequest::ToggleRepeatOne )
    }


    pub fn add_to_liked_songs( &self ) -> Result<(), ServiceError> {
        self.send( PlayerRequest::AddToLikedSongs )
    }


    pub fn remove_from_liked_songs( &self, id: TrackId ) -> Result<(), ServiceError> {
        self.send( PlayerRequest::RemoveFromLikedSongs( id ) )
    }


    pub fn add_to_queue( &self, track: Track ) -> Result<(), ServiceError> {
        self.send( PlayerRequest::AddToQueue( track ) )
    }


    pub fn add_to_queue_by_id( &self, id: TrackId ) -> Result<(), ServiceError> {
        self.send( PlayerRequest::AddToQueueById( id ) )
    }


    pub fn set_volume( &self, volume: f32 ) -> Result<(), ServiceError> {
        self.send( PlayerRequest::SetVolume( volume ) )
    }


    /// Asks the service to release audio and stop.
    pub fn shutdown( &self ) -> Result<(), ServiceError> {
        self.send( PlayerRequest::Shutdown )
    }
}


/// Task that drives a [`Player`].
pub struct PlayerService {
    player: Player,
    catalog: Arc<dyn Catalog>,
    requests: mpsc::UnboundedReceiver<PlayerRequest>,
    engine_events: EngineEventReceiver,
    ticker: Option<Interval>,
}


impl PlayerService {
    /// Wraps a player. `engine_events` must be the receiving end of the
    /// channel the player's engine reports on.
    pub fn new(
        mut player: Player,
        catalog: Arc<dyn Catalog>,
        engine_events: EngineEventReceiver,
    ) -> ( Self, PlayerHandle, watch::Receiver<PlayerSnapshot> ) {
        let ( tx, requests ) = mpsc::unbounded_channel();
        let ( observer, snapshots ) = WatchObserver::new( player.snapshot() );
        player.subscribe( Box::new( observer ) );

        let service = Self {
            player,
            catalog,
            requests,
            engine_events,
            ticker: None,
        };
        ( service, PlayerHandle { tx }, snapshots )
    }


    /// Creates the service and runs it on the current tokio runtime.
    pub fn spawn(
        player: Player,
        catalog: Arc<dyn Catalog>,
        engine_events: EngineEventReceiver,
    ) -> ( PlayerHandle, watch::Receiver<PlayerSnapshot>, JoinHandle<()> ) {
        let ( service, handle, snapshots ) = Self::new( player, catalog, engine_events );
        let task = tokio::spawn( service.run() );
        ( handle, snapshots, task )
    }


    /// Access to the player before the service starts, e.g. to subscribe.
    pub fn player_mut( &mut self ) -> &mut Player {
        &mut self.player
    }


    /// Runs until `Shutdown` arrives or every handle is dropped, then tears
    /// the player down.
    pub async fn run( mut self ) {
        tracing::info!( "Player service started" );

        loop {
            tokio::select! {
                request = self.requests.recv() => match request {
                    Some( PlayerRequest::Shutdown ) | None => break,
                    Some( request ) => self.handle_request( request ).await,
                },
                Some( event ) = self.engine_events.recv() => {
                    self.player.handle_engine_event( event );
                }
                _ = next_tick( &mut self.ticker ) => {
                    self.player.tick();
                }
            }
            self.sync_ticker();
        }

        self.ticker = None;
        self.player.teardown();
        tracing::info!( "Player service stopped" );
    }


    async fn handle_request( &mut self, request: PlayerRequest ) {
        tracing::debug!( "Request: {:?}", request );

        match request {
            PlayerRequest::LoadTrackById( id ) => {
                match self.catalog.find_track( id ).await {
                    Some( track ) => self.player.load_track( track ),
                    None => self.player.report_not_found( Lookup::Track( id ) ),
                }
            }
            PlayerRequest::LoadPlaylistById( id ) => {
                let tracks = self.catalog.find_playlist_tracks( id ).await;
                if tracks.is_empty() {
                    self.player.report_not_found( Lookup::Playlist( id ) );
                } else {
                    self.player.load_playlist( tracks );
                }
            }
            PlayerRequest::LoadTracks( tracks ) => self.player.load_playlist( tracks ),
            PlayerRequest::TogglePlayPause => self.player.toggle_play_pause(),
            PlayerRequest::Seek( fraction ) => self.player.seek( fraction ),
            PlayerRequest::PlayNext => self.player.play_next(),
            PlayerRequest::PlayPrevious => self.player.play_previous(),
            PlayerRequest::ShuffleQueue => self.player.shuffle_queue(),
            PlayerRequest::ToggleRepeatOne => self.player.toggle_repeat_one(),
            PlayerRequest::AddToLikedSongs => self.player.add_to_liked_songs(),
            PlayerRequest::RemoveFromLikedSongs( id ) => self.player.remove_from_liked_songs( id ),
            PlayerRequest::AddToQueue( track ) => self.player.add_to_queue( track ),
            PlayerRequest::AddToQueueById( id ) => {
                match self.catalog.find_track( id ).await {
                    Some( track ) => self.player.add_to_queue( track ),
                    None => self.player.report_not_found( Lookup::Track( id ) ),
                }
            }
            PlayerRequest::SetVolume( volume ) => self.player.set_volume( volume ),
            PlayerRequest::Shutdown => {}
        }
    }


    /// Starts the progress timer when playback starts and drops it when it stops.
    fn sync_ticker( &mut self ) {
        match ( self.player.needs_ticks(), self.ticker.is_some() ) {
            ( true, false ) => {
                let period = self.player.config().tick_interval.max( MIN_TICK_INTERVAL );
                let mut interval = time::interval_at( Instant::now() + period, period );
                interval.set_missed_tick_behavior( MissedTickBehavior::Delay );
                self.ticker = Some( interval );
            }
            ( false, true ) => self.ticker = None,
            _ => {}
        }
    }
}


/// Resolves on the next tick, or never without a timer.
async fn next_tick( ticker: &mut Option<Interval> ) {
    match ticker {
        Some( interval ) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}


#[cfg( test )]
mod tests {
    use super::*;
    use crate::catalog::StaticCatalog;
    use crate::engine::engine_channel;
    use crate::observer::{ ChannelObserver, PlayerEvent, PlayerStatus };
    use crate::player::{ PlayerConfig, PlayerError };
    use crate::testing::{ MockEngine, SessionCall, SharedLog };
    use tokio::sync::mpsc::UnboundedReceiver;


    fn catalog() -> Arc<StaticCatalog> {
        Arc::new(
            StaticCatalog::new( vec![
                Track::new( 1, "One", "A", 30, "https://cdn/1.mp3" ),
                Track::new( 2, "Two", "A", 30, "https://cdn/2.mp3" ),
                Track::new( 3, "Three", "B", 30, "https://cdn/broken.mp3" ),
            ])
            .with_playlist( PlaylistId( 7 ), "Mix", vec![ TrackId( 2 ), TrackId( 1 ) ] ),
        )
    }


    struct Harness {
        handle: PlayerHandle,
        snapshots: watch::Receiver<PlayerSnapshot>,
        events: UnboundedReceiver<PlayerEvent>,
        log: SharedLog,
        task: JoinHandle<()>,
    }


    fn start() -> Harness {
        let ( events_tx, events_rx ) = engine_channel();
        let ( engine, log ) = MockEngine::auto( events_tx );
        let player = Player::new( Box::new( engine ), PlayerConfig::default() );

        let ( mut service, handle, snapshots ) = PlayerService::new( player, catalog(), events_rx );
        let ( observer, events ) = ChannelObserver::new();
        service.player_mut().subscribe( Box::new( observer ) );
        let task = tokio::spawn( service.run() );

        Harness { handle, snapshots, events, log, task }
    }


    async fn wait_for_status( snapshots: &mut watch::Receiver<PlayerSnapshot>, status: PlayerStatus ) -> PlayerSnapshot {
        snapshots.wait_for( |s| s.status == status ).await.unwrap().clone()
    }


    async fn next_report( events: &mut UnboundedReceiver<PlayerEvent> ) -> PlayerError {
        loop {
            match events.recv().await {
                Some( PlayerEvent::Report( error ) ) => return error,
                Some( PlayerEvent::StateChanged( _ ) ) => continue,
                None => panic!( "event channel closed" ),
            }
        }
    }


    #[tokio::test( start_paused = true )]
    async fn test_load_track_by_id_plays() {
        let mut h = start();
        h.handle.load_track_by_id( TrackId( 1 ) ).unwrap();

        let snapshot = wait_for_status( &mut h.snapshots, PlayerStatus::Playing ).await;
        assert_eq!( snapshot.current_track.map( |t| t.id ), Some( TrackId( 1 ) ) );
        assert!( snapshot.is_playing );
    }


    #[tokio::test( start_paused = true )]
    async fn test_unknown_track_is_reported_and_state_kept() {
        let mut h = start();
        h.handle.load_track_by_id( TrackId( 1 ) ).unwrap();
        wait_for_status( &mut h.snapshots, PlayerStatus::Playing ).await;

        h.handle.load_track_by_id( TrackId( 404 ) ).unwrap();
        let error = next_report( &mut h.events ).await;
        assert_eq!( error, PlayerError::NotFound( Lookup::Track( TrackId( 404 ) ) ) );
        assert_eq!( h.snapshots.borrow().current_track.as_ref().map( |t| t.id ), Some( TrackId( 1 ) ) );
    }


    #[tokio::test( start_paused = true )]
    async fn test_empty_playlist_is_reported_as_not_found() {
        let mut h = start();
        h.handle.load_playlist_by_id( PlaylistId( 99 ) ).unwrap();
        let error = next_report( &mut h.events ).await;
        assert_eq!( error, PlayerError::NotFound( Lookup::Playlist( PlaylistId( 99 ) ) ) );
        assert_eq!( h.snapshots.borrow().status, PlayerStatus::Idle );
    }


    #[tokio::test( start_paused = true )]
    async fn test_load_playlist_by_id_fills_queue() {
        let mut h = start();
        h.handle.load_playlist_by_id( PlaylistId( 7 ) ).unwrap();
        let snapshot = wait_for_status( &mut h.snapshots, PlayerStatus::Playing ).await;

        let ids: Vec<u64> = snapshot.queue.iter().map( |t| t.id.0 ).collect();
        assert_eq!( ids, vec![ 2, 1 ] );
        assert_eq!( snapshot.current_track.map( |t| t.id ), Some( TrackId( 2 ) ) );
    }


    #[tokio::test( start_paused = true )]
    async fn test_engine_failure_is_reported() {
        let mut h = start();
        h.handle.load_track_by_id( TrackId( 3 ) ).unwrap();

        let error = next_report( &mut h.events ).await;
        assert!( matches!( error, PlayerError::EngineLoad { track: TrackId( 3 ), .. } ) );
        let snapshot = wait_for_status( &mut h.snapshots, PlayerStatus::Idle ).await;
        assert!( snapshot.current_track.is_none() );
    }


    #[tokio::test( start_paused = true )]
    async fn test_progress_ticks_while_playing_only() {
        let mut h = start();
        h.log.lock().unwrap().position_secs = 3.0;
        h.handle.load_track_by_id( TrackId( 1 ) ).unwrap();
        wait_for_status( &mut h.snapshots, PlayerStatus::Playing ).await;

        let snapshot = h.snapshots.wait_for( |s| s.position_secs == 3.0 ).await.unwrap().clone();
        assert_eq!( snapshot.progress_fraction, 0.1 );

        h.handle.toggle_play_pause().unwrap();
        wait_for_status( &mut h.snapshots, PlayerStatus::Paused ).await;

        h.log.lock().unwrap().position_secs = 7.0;
        time::sleep( Duration::from_secs( 5 ) ).await;
        assert_eq!( h.snapshots.borrow().position_secs, 3.0 );
    }


    #[tokio::test( start_paused = true )]
    async fn test_shutdown_releases_session() {
        let mut h = start();
        h.handle.load_track_by_id( TrackId( 2 ) ).unwrap();
        wait_for_status( &mut h.snapshots, PlayerStatus::Playing ).await;

        h.handle.shutdown().unwrap();
        h.task.await.unwrap();

        let log = h.log.lock().unwrap();
        let id = log.last_created().unwrap();
        assert_eq!( log.calls_for( id ).last(), Some( &SessionCall::Release ) );
        drop( log );
        assert!( matches!( h.handle.play_next(), Err( ServiceError::Stopped ) ) );
    }


    #[tokio::test( start_paused = true )]
    async fn test_spawned_service_runs_until_handles_drop() {
        let ( events_tx, events_rx ) = engine_channel();
        let ( engine, log ) = MockEngine::auto( events_tx );
        let player = Player::new( Box::new( engine ), PlayerConfig::default() );

        let ( handle, mut snapshots, task ) = PlayerService::spawn( player, catalog(), events_rx );
        handle.load_track_by_id( TrackId( 1 ) ).unwrap();
        wait_for_status( &mut snapshots, PlayerStatus::Playing ).await;

        drop( handle );
        task.await.unwrap();

        let log = log.lock().unwrap();
        let id = log.last_created().unwrap();
        assert_eq!( log.calls_for( id ).last(), Some( &SessionCall::Release ) );
    }


    #[tokio::test( start_paused = true )]
    async fn test_add_to_queue_by_id() {
        let mut h = start();
        h.handle.add_to_queue_by_id( TrackId( 2 ) ).unwrap();
        h.handle.add_to_queue_by_id( TrackId( 2 ) ).unwrap();
        h.handle.add_to_queue_by_id( TrackId( 1 ) ).unwrap();

        let snapshot = h.snapshots.wait_for( |s| s.queue.len() == 2 ).await.unwrap().clone();
        assert_eq!( snapshot.status, PlayerStatus::Idle );
        assert_eq!( snapshot.queue[ 0 ].id, TrackId( 2 ) );
    }
}
