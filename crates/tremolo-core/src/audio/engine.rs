//! Playback engine backed by the system audio device.
//!
//! Each session downloads its audio, then gets a dedicated thread that owns
//! the cpal stream and runs the decode loop. The [`AudioSession`] handed to
//! the player only holds shared control state, so it can cross threads while
//! the stream stays put.

use std::sync::atomic::{ AtomicBool, AtomicU64, Ordering };
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rubato::{ FastFixedOut, PolynomialDegree, Resampler };
use tokio::runtime::Handle;

use crate::audio::decoder::{ extension_hint, Decoder };
use crate::audio::output::{ AudioOutput, SampleBuffer };
use crate::engine::{ EngineError, EngineEvent, EngineEventSender, PlaybackEngine, Session, SessionId };


/// Playback engine for HTTP audio URLs.
pub struct AudioEngine {
    runtime: Handle,
    client: reqwest::Client,
    events: EngineEventSender,
}


impl AudioEngine {
    /// Creates an engine that downloads on `runtime` and reports on `events`.
    pub fn new( runtime: Handle, client: reqwest::Client, events: EngineEventSender ) -> Self {
        Self { runtime, client, events }
    }
}


impl PlaybackEngine for AudioEngine {
    fn create_session( &mut self, id: SessionId, audio_url: &str ) {
        let client = self.client.clone();
        let events = self.events.clone();
        let url = audio_url.to_string();

        self.runtime.spawn( async move {
            match fetch( &client, &url ).await {
                Ok( bytes ) => start_session_thread( id, url, bytes, events ),
                Err( e ) => {
                    tracing::warn!( "Session {}: {}", id, e );
                    let _ = events.send( EngineEvent::Loaded { session: id, result: Err( e ) } );
                }
            }
        });
    }
}


async fn fetch( client: &reqwest::Client, url: &str ) -> Result<Vec<u8>, EngineError> {
    if url.is_empty() {
        return Err( EngineError::Fetch( "track has no audio URL".into() ) );
    }

    let response = client
        .get( url )
        .send()
        .await
        .and_then( |r| r.error_for_status() )
        .map_err( |e| EngineError::Fetch( e.to_string() ) )?;
    let bytes = response.bytes().await.map_err( |e| EngineError::Fetch( e.to_string() ) )?;

    tracing::debug!( "Fetched {} bytes from {}", bytes.len(), url );
    Ok( bytes.to_vec() )
}


fn start_session_thread( id: SessionId, url: String, bytes: Vec<u8>, events: EngineEventSender ) {
    let thread_events = events.clone();
    let spawned = thread::Builder::new()
        .name( format!( "session-{}", id.0 ) )
        .spawn( move || run_session( id, &url, bytes, thread_events ) );

    if let Err( e ) = spawned {
        let _ = events.send( EngineEvent::Loaded {
            session: id,
            result: Err( EngineError::Output( e.to_string() ) ),
        });
    }
}


/// Opens decoder and output, hands the session to the player, then decodes
/// until the end of the audio or a release.
fn run_session( id: SessionId, url: &str, bytes: Vec<u8>, events: EngineEventSender ) {
    let fail = |error: EngineError| {
        tracing::warn!( "Session {}: {}", id, error );
        let _ = events.send( EngineEvent::Loaded { session: id, result: Err( error ) } );
    };

    let decoder = match Decoder::from_bytes( bytes, extension_hint( url ) ) {
        Ok( decoder ) => decoder,
        Err( e ) => return fail( EngineError::Decode( e.to_string() ) ),
    };

    let channels = decoder.channels() as u16;
    let ( output, sample_buffer ) = match AudioOutput::new( decoder.sample_rate(), channels ) {
        Ok( pair ) => pair,
        Err( e ) => return fail( EngineError::Output( e.to_string() ) ),
    };

    let resampler = if decoder.sample_rate() != output.sample_rate() {
        tracing::debug!( "Resampling: {} Hz -> {} Hz", decoder.sample_rate(), output.sample_rate() );
        match Resampling::new( decoder.sample_rate(), output.sample_rate(), decoder.channels() ) {
            Ok( r ) => Some( r ),
            Err( e ) => return fail( e ),
        }
    } else {
        None
    };

    // Sessions start paused until the player says play
    sample_buffer.set_paused( true );
    if let Err( e ) = output.play() {
        return fail( EngineError::Output( e.to_string() ) );
    }

    let control = Arc::new( SessionControl::new( sample_buffer, decoder.sample_rate(), output.sample_rate() ) );
    let session = AudioSession { control: Arc::clone( &control ) };
    if events.send( EngineEvent::Loaded { session: id, result: Ok( Box::new( session ) ) } ).is_err() {
        return;
    }

    let reached_end = decode_loop( decoder, &control, resampler );
    drop( output );

    if reached_end && !control.is_stopped() {
        tracing::debug!( "Session {} completed", id );
        let _ = events.send( EngineEvent::Completed { session: id } );
    }
}


/// Marks an empty seek request; no real position has these bits.
const NO_SEEK: u64 = u64::MAX;


/// State shared between a session handle and its thread.
#[derive( Debug )]
struct SessionControl {
    buffer: Arc<SampleBuffer>,
    stop: AtomicBool,
    /// Source frames decoded so far, including any seek offset
    frames: AtomicU64,
    sample_rate: u32,
    /// Rate of the samples waiting in `buffer`
    output_rate: u32,
    /// Requested position as `f64` bits, or `NO_SEEK`
    seek_request: AtomicU64,
}


impl SessionControl {
    fn new( buffer: Arc<SampleBuffer>, sample_rate: u32, output_rate: u32 ) -> Self {
        Self {
            buffer,
            stop: AtomicBool::new( false ),
            frames: AtomicU64::new( 0 ),
            sample_rate,
            output_rate,
            seek_request: AtomicU64::new( NO_SEEK ),
        }
    }


    fn request_seek( &self, position_secs: f64 ) {
        self.seek_request.store( position_secs.max( 0.0 ).to_bits(), Ordering::Release );
    }


    fn is_stopped( &self ) -> bool {
        self.stop.load( Ordering::Relaxed )
    }


    fn take_seek( &self ) -> Option<f64> {
        match self.seek_request.swap( NO_SEEK, Ordering::Acquire ) {
            NO_SEEK => None,
            bits => Some( f64::from_bits( bits ) ),
        }
    }


    /// Position of the sample the device plays next.
    ///
    /// Decoding runs ahead of the device by whatever sits in the buffer.
    fn position_secs( &self ) -> f64 {
        let decoded = self.frames.load( Ordering::Relaxed ) as f64 / f64::from( self.sample_rate.max( 1 ) );
        let buffered = self.buffer.frames() as f64 / f64::from( self.output_rate.max( 1 ) );
        ( decoded - buffered ).max( 0.0 )
    }


    fn set_position( &self, position_secs: f64 ) {
        let frames = ( position_secs.max( 0.0 ) * f64::from( self.sample_rate ) ) as u64;
        self.frames.store( frames, Ordering::Relaxed );
    }
}


/// Player-side handle to a session thread.
#[derive( Debug )]
pub struct AudioSession {
    control: Arc<SessionControl>,
}


impl Session for AudioSession {
    fn play( &mut self ) {
        self.control.buffer.set_paused( false );
    }


    fn pause( &mut self ) {
        self.control.buffer.set_paused( true );
    }


    fn seek_to( &mut self, position_secs: f64 ) {
        self.control.request_seek( position_secs );
        self.control.buffer.clear();
        self.control.set_position( position_secs );
    }


    fn position_secs( &self ) -> f64 {
        self.control.position_secs()
    }


    fn set_volume( &mut self, volume: f32 ) {
        self.control.buffer.set_volume( volume );
    }


    fn release( &mut self ) {
        self.control.stop.store( true, Ordering::Relaxed );
        self.control.buffer.clear();
    }
}


impl Drop for AudioSession {
    fn drop( &mut self ) {
        self.release();
    }
}


/// Rate conversion between the source and the device.
struct Resampling {
    resampler: FastFixedOut<f32>,
    /// Planar input waiting for a full chunk
    pending: Vec<Vec<f32>>,
    channels: usize,
}


impl Resampling {
    fn new( from_rate: u32, to_rate: u32, channels: usize ) -> Result<Self, EngineError> {
        let resampler = FastFixedOut::<f32>::new(
            f64::from( to_rate ) / f64::from( from_rate ),
            2.0,
            PolynomialDegree::Cubic,
            1024,
            channels,
        ).map_err( |e| EngineError::Output( format!( "Failed to create resampler: {}", e ) ) )?;

        Ok( Self {
            resampler,
            pending: vec![ Vec::new(); channels ],
            channels,
        })
    }


    /// Feeds interleaved samples, returns whatever interleaved output is ready.
    fn process( &mut self, samples: &[f32] ) -> Vec<f32> {
        for frame in samples.chunks( self.channels ) {
            for ( ch, sample ) in frame.iter().enumerate() {
                self.pending[ ch ].push( *sample );
            }
        }

        let mut out = Vec::new();
        while self.pending[ 0 ].len() >= self.resampler.input_frames_next() {
            let needed = self.resampler.input_frames_next();
            let chunk: Vec<Vec<f32>> = self.pending.iter_mut().map( |ch| ch.drain( ..needed ).collect() ).collect();
            match self.resampler.process( &chunk, None ) {
                Ok( resampled ) => out.extend( interleave( &resampled ) ),
                Err( e ) => {
                    tracing::error!( "Resample error: {}", e );
                    break;
                }
            }
        }
        out
    }


    /// Resamples whatever is left at end of file.
    fn flush( &mut self ) -> Vec<f32> {
        if self.pending[ 0 ].is_empty() {
            return Vec::new();
        }
        let result = self.resampler.process_partial( Some( self.pending.as_slice() ), None );
        for ch in &mut self.pending {
            ch.clear();
        }
        match result {
            Ok( resampled ) => interleave( &resampled ),
            Err( e ) => {
                tracing::error!( "Final resample error: {}", e );
                Vec::new()
            }
        }
    }


    fn reset( &mut self ) {
        self.resampler.reset();
        for ch in &mut self.pending {
            ch.clear();
        }
    }
}


/// [[L0, L1, ...], [R0, R1, ...]] -> [L0, R0, L1, R1, ...]
fn interleave( channels: &[Vec<f32>] ) -> Vec<f32> {
    let frames = channels.first().map_or( 0, Vec::len );
    let mut out = Vec::with_capacity( frames * channels.len() );
    for f in 0..frames {
        for ch in channels {
            out.push( ch[ f ] );
        }
    }
    out
}


/// Pushes samples, waiting for room. Returns false if stopped meanwhile.
fn push_all( control: &SessionControl, samples: &[f32] ) -> bool {
    let mut offset = 0;
    while offset < samples.len() {
        if control.is_stopped() {
            return false;
        }
        let pushed = control.buffer.push( &samples[ offset.. ] );
        offset += pushed;
        if pushed == 0 {
            thread::sleep( Duration::from_millis( 5 ) );
        }
    }
    true
}


/// Returns true when the audio ran to its end, false when released.
fn decode_loop( mut decoder: Decoder, control: &SessionControl, mut resampler: Option<Resampling> ) -> bool {
    let channels = decoder.channels().max( 1 );
    // Keep about 50ms decoded ahead
    let target_buffer = ( decoder.sample_rate() as usize * channels ) / 20;

    loop {
        if control.is_stopped() {
            return false;
        }

        if let Some( position ) = control.take_seek() {
            match decoder.seek( position ) {
                Ok(()) => {
                    control.buffer.clear();
                    if let Some( r ) = resampler.as_mut() {
                        r.reset();
                    }
                    control.set_position( position );
                }
                Err( e ) => tracing::warn!( "Seek failed: {}", e ),
            }
        }

        if control.buffer.is_paused() || control.buffer.len() > target_buffer {
            thread::sleep( Duration::from_millis( 5 ) );
            continue;
        }

        match decoder.decode_next() {
            Ok( Some( samples ) ) => {
                control.frames.fetch_add( ( samples.len() / channels ) as u64, Ordering::Relaxed );
                let samples = match resampler.as_mut() {
                    Some( r ) => r.process( &samples ),
                    None => samples,
                };
                if !push_all( control, &samples ) {
                    return false;
                }
            }
            Ok( None ) => break,
            Err( e ) => {
                // Treat a broken stream as its end so the queue moves on
                tracing::error!( "Decode error: {}", e );
                break;
            }
        }
    }

    if let Some( r ) = resampler.as_mut() {
        let tail = r.flush();
        if !push_all( control, &tail ) {
            return false;
        }
    }

    // Let the device drain what is buffered
    while !control.buffer.is_empty() {
        if control.is_stopped() {
            return false;
        }
        thread::sleep( Duration::from_millis( 10 ) );
    }
    true
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_interleave() {
        let planar = vec![ vec![ 1.0, 2.0 ], vec![ 10.0, 20.0 ] ];
        assert_eq!( interleave( &planar ), vec![ 1.0, 10.0, 2.0, 20.0 ] );
        assert!( interleave( &[] ).is_empty() );
    }


    #[test]
    fn test_position_excludes_buffered_audio() {
        // Mono 100 Hz source resampled to 200 Hz
        let buffer = Arc::new( SampleBuffer::new( 1000, 1, 2 ) );
        let control = SessionControl::new( Arc::clone( &buffer ), 100, 200 );

        control.frames.store( 300, Ordering::Relaxed );
        assert_eq!( control.position_secs(), 3.0 );

        buffer.push( &[ 0.0; 100 ] );
        assert_eq!( control.position_secs(), 2.5 );

        // Never negative while the first samples are still queued
        control.frames.store( 10, Ordering::Relaxed );
        assert_eq!( control.position_secs(), 0.0 );
    }


    #[test]
    fn test_seek_request_is_taken_once() {
        let control = SessionControl::new( Arc::new( SampleBuffer::new( 8, 1, 1 ) ), 100, 100 );
        assert_eq!( control.take_seek(), None );

        control.request_seek( 1.0 );
        control.request_seek( 0.0 );
        assert_eq!( control.take_seek(), Some( 0.0 ) );
        assert_eq!( control.take_seek(), None );

        control.request_seek( -4.0 );
        assert_eq!( control.take_seek(), Some( 0.0 ) );
    }


    #[test]
    fn test_session_handle_controls_shared_state() {
        let buffer = Arc::new( SampleBuffer::new( 64, 2, 2 ) );
        let control = Arc::new( SessionControl::new( Arc::clone( &buffer ), 100, 100 ) );
        let mut session = AudioSession { control: Arc::clone( &control ) };

        session.play();
        assert!( !buffer.is_paused() );
        session.pause();
        assert!( buffer.is_paused() );

        session.seek_to( 2.5 );
        assert_eq!( session.position_secs(), 2.5 );
        assert_eq!( control.take_seek(), Some( 2.5 ) );
        assert_eq!( control.take_seek(), None );

        session.set_volume( 0.3 );
        assert_eq!( buffer.volume(), 0.3 );

        buffer.push( &[ 0.1; 8 ] );
        drop( session );
        assert!( control.is_stopped() );
        assert!( buffer.is_empty() );
    }


    #[test]
    fn test_resampling_produces_scaled_output() {
        let mut resampling = Resampling::new( 22050, 44100, 1 ).unwrap();
        let input = vec![ 0.0_f32; 22050 ];

        let mut produced = resampling.process( &input ).len();
        produced += resampling.flush().len();

        // Roughly twice as many samples, within a chunk
        assert!( produced >= 44100 - 2048 && produced <= 44100 + 2048, "produced {}", produced );
    }
}
