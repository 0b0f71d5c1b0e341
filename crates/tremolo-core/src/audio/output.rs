//! Audio output via cpal
//!
//! Sends decoded PCM samples to the system audio device.

use std::collections::VecDeque;
use std::sync::atomic::{ AtomicBool, AtomicU32, Ordering };
use std::sync::{ Arc, Mutex };

use cpal::traits::{ DeviceTrait, HostTrait, StreamTrait };
use thiserror::Error;


/// Errors that can occur with audio output.
#[derive( Debug, Error )]
pub enum OutputError {
    #[error( "No output device available" )]
    NoDevice,

    #[error( "Failed to get stream config: {0}" )]
    StreamConfig( String ),

    #[error( "Failed to build output stream: {0}" )]
    BuildStream( String ),

    #[error( "Failed to play stream: {0}" )]
    PlayStream( String ),
}


/// Sample queue between the decode thread and the audio callback.
///
/// Converts between the source and device channel layouts on the way out.
#[derive( Debug )]
pub struct SampleBuffer {
    buffer: Mutex<VecDeque<f32>>,
    capacity: usize,
    paused: AtomicBool,
    /// f32 bits
    volume: AtomicU32,
    source_channels: usize,
    output_channels: usize,
}


impl SampleBuffer {
    pub fn new( capacity: usize, source_channels: u16, output_channels: u16 ) -> Self {
        Self {
            buffer: Mutex::new( VecDeque::with_capacity( capacity ) ),
            capacity,
            paused: AtomicBool::new( false ),
            volume: AtomicU32::new( 1.0_f32.to_bits() ),
            source_channels: usize::from( source_channels.max( 1 ) ),
            output_channels: usize::from( output_channels.max( 1 ) ),
        }
    }


    /// Pushes samples. Returns how many fit.
    pub fn push( &self, samples: &[f32] ) -> usize {
        let mut buf = self.buffer.lock().unwrap();
        let to_push = samples.len().min( self.capacity.saturating_sub( buf.len() ) );
        buf.extend( samples[ ..to_push ].iter().copied() );
        to_push
    }


    /// Fills `output` with device frames, padding with silence.
    ///
    /// Returns the number of samples written from the queue.
    pub fn pop( &self, output: &mut [f32] ) -> usize {
        output.fill( 0.0 );
        if self.paused.load( Ordering::Relaxed ) {
            return 0;
        }

        let src_ch = self.source_channels;
        let out_ch = self.output_channels;
        let volume = self.volume();
        let mut buf = self.buffer.lock().unwrap();

        let frames = ( output.len() / out_ch ).min( buf.len() / src_ch );
        let mut frame = vec![ 0.0_f32; src_ch ];

        for out_frame in output.chunks_exact_mut( out_ch ).take( frames ) {
            for ( slot, sample ) in frame.iter_mut().zip( buf.drain( ..src_ch ) ) {
                *slot = sample;
            }

            if out_ch == 1 {
                // Mix down
                out_frame[ 0 ] = frame.iter().sum::<f32>() / src_ch as f32 * volume;
            } else {
                // Map channels, repeating the last source channel if the device has more
                for ( ch, out ) in out_frame.iter_mut().enumerate() {
                    *out = frame[ ch.min( src_ch - 1 ) ] * volume;
                }
            }
        }

        frames * out_ch
    }


    pub fn len( &self ) -> usize {
        self.buffer.lock().unwrap().len()
    }


    /// Buffered samples counted as source frames.
    pub fn frames( &self ) -> usize {
        self.len() / self.source_channels
    }


    pub fn is_empty( &self ) -> bool {
        self.buffer.lock().unwrap().is_empty()
    }


    pub fn clear( &self ) {
        self.buffer.lock().unwrap().clear();
    }


    pub fn set_paused( &self, paused: bool ) {
        self.paused.store( paused, Ordering::Relaxed );
    }


    pub fn is_paused( &self ) -> bool {
        self.paused.load( Ordering::Relaxed )
    }


    /// Sets the volume level (0.0 = mute, 1.0 = normal).
    pub fn set_volume( &self, volume: f32 ) {
        self.volume.store( volume.to_bits(), Ordering::Relaxed );
    }


    pub fn volume( &self ) -> f32 {
        f32::from_bits( self.volume.load( Ordering::Relaxed ) )
    }
}


/// Audio output handler.
/// Note: This struct is NOT Send/Sync due to cpal::Stream.
/// Keep it on the thread where it was created.
pub struct AudioOutput {
    stream: cpal::Stream,
    sample_rate: u32,
}


impl AudioOutput {
    /// Opens the default device for the given source format.
    ///
    /// Returns the output and the buffer to push decoded samples into.
    pub fn new(
        source_sample_rate: u32,
        source_channels: u16,
    ) -> Result<( Self, Arc<SampleBuffer> ), OutputError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or( OutputError::NoDevice )?;

        tracing::debug!( "Using output device: {:?}", device.name() );

        let supported: Vec<_> = device
            .supported_output_configs()
            .map_err( |e| OutputError::StreamConfig( e.to_string() ) )?
            .collect();

        let supports_rate = |c: &cpal::SupportedStreamConfigRange| {
            c.min_sample_rate().0 <= source_sample_rate && c.max_sample_rate().0 >= source_sample_rate
        };

        // Prefer the source layout, then any layout at the source rate, then
        // the device default (the caller resamples)
        let config = match supported.iter()
            .find( |c| c.channels() == source_channels && supports_rate( *c ) )
            .or_else( || supported.iter().find( |c| supports_rate( *c ) ) )
        {
            Some( range ) => range.clone().with_sample_rate( cpal::SampleRate( source_sample_rate ) ).config(),
            None => device
                .default_output_config()
                .map_err( |e| OutputError::StreamConfig( e.to_string() ) )?
                .config(),
        };

        tracing::debug!( "Audio output config: {} Hz, {} channels", config.sample_rate.0, config.channels );

        // About 500ms of audio
        let capacity = ( source_sample_rate as usize ) * ( source_channels as usize ) / 2;
        let sample_buffer = Arc::new( SampleBuffer::new( capacity, source_channels, config.channels ) );
        let callback_buffer = Arc::clone( &sample_buffer );

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    callback_buffer.pop( data );
                },
                |err| tracing::error!( "Audio output error: {}", err ),
                None,
            )
            .map_err( |e| OutputError::BuildStream( e.to_string() ) )?;

        Ok(( Self { stream, sample_rate: config.sample_rate.0 }, sample_buffer ))
    }


    /// Starts audio output.
    pub fn play( &self ) -> Result<(), OutputError> {
        self.stream
            .play()
            .map_err( |e| OutputError::PlayStream( e.to_string() ) )
    }


    /// Gets the device sample rate.
    pub fn sample_rate( &self ) -> u32 {
        self.sample_rate
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_pop_passes_through_matching_layout() {
        let buffer = SampleBuffer::new( 16, 2, 2 );
        buffer.push( &[ 0.1, 0.2, 0.3, 0.4 ] );

        let mut out = [ 1.0_f32; 6 ];
        assert_eq!( buffer.pop( &mut out ), 4 );
        assert_eq!( out, [ 0.1, 0.2, 0.3, 0.4, 0.0, 0.0 ] );
    }


    #[test]
    fn test_pop_mono_to_stereo() {
        let buffer = SampleBuffer::new( 16, 1, 2 );
        buffer.push( &[ 0.5, 0.25 ] );

        let mut out = [ 0.0_f32; 4 ];
        buffer.pop( &mut out );
        assert_eq!( out, [ 0.5, 0.5, 0.25, 0.25 ] );
    }


    #[test]
    fn test_pop_stereo_to_mono_mixes() {
        let buffer = SampleBuffer::new( 16, 2, 1 );
        buffer.push( &[ 0.5, 0.25 ] );

        let mut out = [ 0.0_f32; 1 ];
        buffer.pop( &mut out );
        assert_eq!( out, [ 0.375 ] );
    }


    #[test]
    fn test_paused_outputs_silence_and_keeps_samples() {
        let buffer = SampleBuffer::new( 16, 1, 1 );
        buffer.push( &[ 0.5, 0.5 ] );
        buffer.set_paused( true );

        let mut out = [ 1.0_f32; 2 ];
        assert_eq!( buffer.pop( &mut out ), 0 );
        assert_eq!( out, [ 0.0, 0.0 ] );
        assert_eq!( buffer.len(), 2 );
    }


    #[test]
    fn test_volume_scales_output() {
        let buffer = SampleBuffer::new( 16, 1, 1 );
        buffer.set_volume( 0.5 );
        buffer.push( &[ 0.5 ] );

        let mut out = [ 0.0_f32; 1 ];
        buffer.pop( &mut out );
        assert_eq!( out, [ 0.25 ] );
    }


    #[test]
    fn test_frames_count_source_channels() {
        let buffer = SampleBuffer::new( 16, 2, 1 );
        buffer.push( &[ 0.5; 6 ] );
        assert_eq!( buffer.len(), 6 );
        assert_eq!( buffer.frames(), 3 );
    }


    #[test]
    fn test_push_respects_capacity() {
        let buffer = SampleBuffer::new( 3, 1, 1 );
        assert_eq!( buffer.push( &[ 0.0; 5 ] ), 3 );
        assert_eq!( buffer.push( &[ 0.0 ] ), 0 );
    }
}
