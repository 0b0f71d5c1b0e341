//! State snapshots and the observers that receive them.

use tokio::sync::{ mpsc, watch };

use crate::player::PlayerError;
use crate::track::{ Track, TrackId };


/// Coarse playback state.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Default )]
pub enum PlayerStatus {
    /// No current track.
    #[default]
    Idle,
    /// Track chosen, session being created.
    Loading,
    Paused,
    Playing,
}


/// Everything a view needs to render the player.
#[derive( Debug, Clone, PartialEq, Default )]
pub struct PlayerSnapshot {
    pub status: PlayerStatus,
    pub current_track: Option<Track>,
    /// While loading, whether playback starts once the track is ready.
    pub is_playing: bool,
    pub progress_fraction: f64,
    pub position_secs: f64,
    pub repeat_one: bool,
    pub volume: f32,
    pub queue: Vec<Track>,
    pub liked_track_ids: Vec<TrackId>,
}


impl PlayerSnapshot {
    /// Returns true if the current track is liked.
    pub fn current_is_liked( &self ) -> bool {
        self.current_track
            .as_ref()
            .map( |t| self.liked_track_ids.contains( &t.id ) )
            .unwrap_or( false )
    }
}


/// Receives player notifications. Called synchronously after each change.
pub trait StateObserver: Send {
    fn on_state_changed( &mut self, snapshot: &PlayerSnapshot );

    /// A non-fatal condition worth showing to the user.
    fn on_report( &mut self, _report: &PlayerError ) {}
}


/// Notifications forwarded by [`ChannelObserver`].
#[derive( Debug, Clone )]
pub enum PlayerEvent {
    StateChanged( PlayerSnapshot ),
    Report( PlayerError ),
}


/// Forwards every notification over an unbounded channel.
#[derive( Debug )]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<PlayerEvent>,
}


impl ChannelObserver {
    pub fn new() -> ( Self, mpsc::UnboundedReceiver<PlayerEvent> ) {
        let ( tx, rx ) = mpsc::unbounded_channel();
        ( Self { tx }, rx )
    }
}


impl StateObserver for ChannelObserver {
    fn on_state_changed( &mut self, snapshot: &PlayerSnapshot ) {
        // Receiver gone means the view closed; nothing to do.
        let _ = self.tx.send( PlayerEvent::StateChanged( snapshot.clone() ) );
    }


    fn on_report( &mut self, report: &PlayerError ) {
        let _ = self.tx.send( PlayerEvent::Report( report.clone() ) );
    }
}


/// Keeps only the latest snapshot, for views that poll.
#[derive( Debug )]
pub struct WatchObserver {
    tx: watch::Sender<PlayerSnapshot>,
}


impl WatchObserver {
    pub fn new( initial: PlayerSnapshot ) -> ( Self, watch::Receiver<PlayerSnapshot> ) {
        let ( tx, rx ) = watch::channel( initial );
        ( Self { tx }, rx )
    }
}


impl StateObserver for WatchObserver {
    fn on_state_changed( &mut self, snapshot: &PlayerSnapshot ) {
        self.tx.send_replace( snapshot.clone() );
    }
}


/// Registered observers, notified in registration order.
#[derive( Default )]
pub struct ObserverList {
    observers: Vec<Box<dyn StateObserver>>,
}


impl ObserverList {
    pub fn push( &mut self, observer: Box<dyn StateObserver> ) {
        self.observers.push( observer );
    }


    pub fn publish( &mut self, snapshot: &PlayerSnapshot ) {
        for observer in &mut self.observers {
            observer.on_state_changed( snapshot );
        }
    }


    pub fn report( &mut self, report: &PlayerError ) {
        for observer in &mut self.observers {
            observer.on_report( report );
        }
    }


    pub fn len( &self ) -> usize {
        self.observers.len()
    }


    pub fn is_empty( &self ) -> bool {
        self.observers.is_empty()
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_channel_observer_forwards_snapshots_and_reports() {
        let ( observer, mut rx ) = ChannelObserver::new();
        let mut list = ObserverList::default();
        list.push( Box::new( observer ) );

        let snapshot = PlayerSnapshot { position_secs: 3.0, ..Default::default() };
        list.publish( &snapshot );
        list.report( &PlayerError::InvariantViolation( "test" ) );

        match rx.try_recv() {
            Ok( PlayerEvent::StateChanged( s ) ) => assert_eq!( s.position_secs, 3.0 ),
            other => panic!( "unexpected event: {:?}", other ),
        }
        assert!( matches!( rx.try_recv(), Ok( PlayerEvent::Report( _ ) ) ) );
    }


    #[test]
    fn test_watch_observer_keeps_latest() {
        let ( mut observer, rx ) = WatchObserver::new( PlayerSnapshot::default() );
        observer.on_state_changed( &PlayerSnapshot { repeat_one: true, ..Default::default() } );
        assert!( rx.borrow().repeat_one );
    }


    #[test]
    fn test_current_is_liked() {
        let track = Track::new( 4, "t", "a", 10, "" );
        let snapshot = PlayerSnapshot {
            current_track: Some( track ),
            liked_track_ids: vec![ TrackId( 4 ) ],
            ..Default::default()
        };
        assert!( snapshot.current_is_liked() );
        assert!( !PlayerSnapshot::default().current_is_liked() );
    }
}
