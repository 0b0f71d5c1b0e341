//! Recording engine used by the unit tests.

use std::sync::{ Arc, Mutex };

use crate::engine::{ EngineError, EngineEvent, EngineEventSender, PlaybackEngine, Session, SessionId };


/// A call made on a session.
#[derive( Debug, Clone, PartialEq )]
pub enum SessionCall {
    Play,
    Pause,
    SeekTo( f64 ),
    SetVolume( f32 ),
    Release,
}


#[derive( Debug, Default )]
pub struct EngineLog {
    pub created: Vec<( SessionId, String )>,
    pub calls: Vec<( SessionId, SessionCall )>,
    /// Position every mock session reports.
    pub position_secs: f64,
}


impl EngineLog {
    pub fn calls_for( &self, id: SessionId ) -> Vec<SessionCall> {
        self.calls.iter()
            .filter( |( session, _ )| *session == id )
            .map( |( _, call )| call.clone() )
            .collect()
    }


    pub fn last_created( &self ) -> Option<SessionId> {
        self.created.last().map( |( id, _ )| *id )
    }
}


pub type SharedLog = Arc<Mutex<EngineLog>>;


/// Engine that records requests.
///
/// Without an event sender, tests deliver `Loaded` themselves. With one, every
/// request is answered at once: URLs containing "broken" fail, the rest load.
pub struct MockEngine {
    log: SharedLog,
    events: Option<EngineEventSender>,
}


impl MockEngine {
    pub fn manual() -> ( Self, SharedLog ) {
        let log = SharedLog::default();
        ( Self { log: Arc::clone( &log ), events: None }, log )
    }


    pub fn auto( events: EngineEventSender ) -> ( Self, SharedLog ) {
        let log = SharedLog::default();
        ( Self { log: Arc::clone( &log ), events: Some( events ) }, log )
    }
}


impl PlaybackEngine for MockEngine {
    fn create_session( &mut self, id: SessionId, audio_url: &str ) {
        self.log.lock().unwrap().created.push(( id, audio_url.to_string() ));

        if let Some( events ) = &self.events {
            let result = if audio_url.contains( "broken" ) {
                Err( EngineError::Decode( "unsupported format".into() ) )
            } else {
                Ok( MockSession::boxed( id, &self.log ) )
            };
            let _ = events.send( EngineEvent::Loaded { session: id, result } );
        }
    }
}


#[derive( Debug )]
pub struct MockSession {
    id: SessionId,
    log: SharedLog,
}


impl MockSession {
    pub fn boxed( id: SessionId, log: &SharedLog ) -> Box<dyn Session> {
        Box::new( Self { id, log: Arc::clone( log ) } )
    }


    fn record( &self, call: SessionCall ) {
        self.log.lock().unwrap().calls.push(( self.id, call ));
    }
}


impl Session for MockSession {
    fn play( &mut self ) {
        self.record( SessionCall::Play );
    }


    fn pause( &mut self ) {
        self.record( SessionCall::Pause );
    }


    fn seek_to( &mut self, position_secs: f64 ) {
        self.record( SessionCall::SeekTo( position_secs ) );
    }


    fn position_secs( &self ) -> f64 {
        self.log.lock().unwrap().position_secs
    }


    fn set_volume( &mut self, volume: f32 ) {
        self.record( SessionCall::SetVolume( volume ) );
    }


    fn release( &mut self ) {
        self.record( SessionCall::Release );
    }
}
