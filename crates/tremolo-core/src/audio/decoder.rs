//! Audio decoding via Symphonia
//!
//! Decodes an in-memory audio file into interleaved f32 samples.

use std::io::Cursor;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{ Decoder as SymphoniaDecoder, DecoderOptions, CODEC_TYPE_NULL };
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{ FormatOptions, FormatReader, SeekMode, SeekTo };
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::Time;
use thiserror::Error;


/// Errors that can occur during decoding.
#[derive( Debug, Error )]
pub enum DecoderError {
    #[error( "Unsupported format" )]
    UnsupportedFormat,

    #[error( "No audio tracks found" )]
    NoAudioTrack,

    #[error( "Decoder creation failed: {0}" )]
    DecoderCreation( String ),

    #[error( "Decode error: {0}" )]
    Decode( String ),

    #[error( "Seek error: {0}" )]
    Seek( String ),
}


/// Audio decoder wrapper around Symphonia.
pub struct Decoder {
    format_reader: Box<dyn FormatReader>,
    decoder: Box<dyn SymphoniaDecoder>,
    track_id: u32,
    sample_rate: u32,
    channels: usize,
    sample_buf: Option<SampleBuffer<f32>>,
}


impl Decoder {
    /// Opens an audio file held in memory.
    ///
    /// `extension` is a format hint such as "mp3".
    pub fn from_bytes( bytes: Vec<u8>, extension: Option<&str> ) -> Result<Self, DecoderError> {
        let mss = MediaSourceStream::new( Box::new( Cursor::new( bytes ) ), Default::default() );

        let mut hint = Hint::new();
        if let Some( ext ) = extension {
            hint.with_extension( ext );
        }

        let opened = symphonia::default::get_probe()
            .format( &hint, mss, &FormatOptions::default(), &MetadataOptions::default() )
            .map_err( |_| DecoderError::UnsupportedFormat )?;
        let format_reader = opened.format;

        let track = format_reader
            .tracks()
            .iter()
            .find( |t| t.codec_params.codec != CODEC_TYPE_NULL )
            .ok_or( DecoderError::NoAudioTrack )?;

        let track_id = track.id;
        let codec_params = &track.codec_params;
        let sample_rate = codec_params.sample_rate.unwrap_or( 44100 );
        let channels = codec_params.channels.map( |c| c.count() ).unwrap_or( 2 );

        tracing::debug!( "Opened audio: {} Hz, {} channels", sample_rate, channels );

        let decoder = symphonia::default::get_codecs()
            .make( codec_params, &DecoderOptions::default() )
            .map_err( |e| DecoderError::DecoderCreation( e.to_string() ) )?;

        Ok( Self {
            format_reader,
            decoder,
            track_id,
            sample_rate,
            channels,
            sample_buf: None,
        })
    }


    /// Returns the sample rate of the audio.
    pub fn sample_rate( &self ) -> u32 {
        self.sample_rate
    }


    /// Returns the number of channels.
    pub fn channels( &self ) -> usize {
        self.channels
    }


    /// Decodes the next packet and returns interleaved f32 samples.
    ///
    /// Returns None when EOF is reached.
    pub fn decode_next( &mut self ) -> Result<Option<Vec<f32>>, DecoderError> {
        loop {
            let packet = match self.format_reader.next_packet() {
                Ok( packet ) => packet,
                Err( SymphoniaError::IoError( ref e ) ) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    return Ok( None );
                }
                Err( e ) => return Err( DecoderError::Decode( e.to_string() ) ),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode( &packet ) {
                Ok( decoded ) => decoded,
                // Corrupt packets are skipped
                Err( SymphoniaError::DecodeError( _ ) ) => continue,
                Err( e ) => return Err( DecoderError::Decode( e.to_string() ) ),
            };

            let spec = *decoded.spec();
            let frames = decoded.frames();

            let too_small = self.sample_buf.as_ref().map_or( true, |b| b.capacity() < frames );
            if too_small {
                self.sample_buf = Some( SampleBuffer::new( frames as u64, spec ) );
            }

            if let Some( buf ) = self.sample_buf.as_mut() {
                buf.copy_interleaved_ref( decoded );
                return Ok( Some( buf.samples().to_vec() ) );
            }
        }
    }


    /// Seeks to a position in seconds.
    pub fn seek( &mut self, position_secs: f64 ) -> Result<(), DecoderError> {
        let seek_to = SeekTo::Time {
            time: Time::from( position_secs ),
            track_id: Some( self.track_id ),
        };

        self.format_reader
            .seek( SeekMode::Accurate, seek_to )
            .map_err( |e| DecoderError::Seek( e.to_string() ) )?;
        self.decoder.reset();

        Ok(())
    }
}


/// Extension of the file a URL points at, ignoring any query string.
pub fn extension_hint( url: &str ) -> Option<&str> {
    let path = url.split( [ '?', '#' ] ).next().unwrap_or( url );
    let file = path.rsplit( '/' ).next()?;
    let ( _, ext ) = file.rsplit_once( '.' )?;
    if ext.is_empty() || ext.len() > 5 {
        None
    } else {
        Some( ext )
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_extension_hint() {
        assert_eq!( extension_hint( "https://cdn.example.com/stream/abc.mp3?hdnea=exp=1" ), Some( "mp3" ) );
        assert_eq!( extension_hint( "https://cdn.example.com/a/b.flac" ), Some( "flac" ) );
        assert_eq!( extension_hint( "https://cdn.example.com/stream/abc" ), None );
    }


    #[test]
    fn test_garbage_is_unsupported() {
        let result = Decoder::from_bytes( vec![ 0u8; 64 ], Some( "mp3" ) );
        assert!( result.is_err() );
    }
}
