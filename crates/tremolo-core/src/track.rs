//! Track metadata as resolved from the catalog.

use std::fmt;


/// Stable catalog identifier of a track.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord )]
pub struct TrackId( pub u64 );


impl fmt::Display for TrackId {
    fn fmt( &self, f: &mut fmt::Formatter<'_> ) -> fmt::Result {
        write!( f, "{}", self.0 )
    }
}


impl From<u64> for TrackId {
    fn from( id: u64 ) -> Self {
        Self( id )
    }
}


/// Catalog identifier of a playlist.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Hash )]
pub struct PlaylistId( pub u64 );


impl fmt::Display for PlaylistId {
    fn fmt( &self, f: &mut fmt::Formatter<'_> ) -> fmt::Result {
        write!( f, "{}", self.0 )
    }
}


/// A playable item.
///
/// Everything except `last_position_secs` is fixed once the catalog has
/// returned it. The last position is a display hint and never drives playback.
#[derive( Debug, Clone, PartialEq )]
pub struct Track {
    pub id: TrackId,
    pub title: String,
    pub artist: String,
    pub cover_url: String,
    pub duration_secs: u32,
    pub audio_url: String,
    pub last_position_secs: Option<f64>,
}


impl Track {
    /// Creates a track with no cover art and no cached position.
    pub fn new(
        id: impl Into<TrackId>,
        title: impl Into<String>,
        artist: impl Into<String>,
        duration_secs: u32,
        audio_url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            artist: artist.into(),
            cover_url: String::new(),
            duration_secs,
            audio_url: audio_url.into(),
            last_position_secs: None,
        }
    }


    /// Sets the cover art URL.
    pub fn with_cover( mut self, cover_url: impl Into<String> ) -> Self {
        self.cover_url = cover_url.into();
        self
    }


    /// Total duration in seconds as a float.
    pub fn duration( &self ) -> f64 {
        f64::from( self.duration_secs )
    }


    /// Records where playback of this track was left, clamped to its duration.
    pub fn remember_position( &mut self, position_secs: f64 ) {
        self.last_position_secs = Some( position_secs.clamp( 0.0, self.duration() ) );
    }


    /// "Artist - Title" label used by the front-end.
    pub fn display_name( &self ) -> String {
        if self.artist.is_empty() {
            self.title.clone()
        } else {
            format!( "{} - {}", self.artist, self.title )
        }
    }
}


/// Playlist as listed by the catalog, without its tracks.
#[derive( Debug, Clone, PartialEq )]
pub struct PlaylistSummary {
    pub id: PlaylistId,
    pub title: String,
    pub track_count: u32,
    pub cover_url: String,
}


/// Formats seconds as `M:SS`.
pub fn format_time( secs: f64 ) -> String {
    let secs = secs.max( 0.0 ) as u64;
    format!( "{}:{:02}", secs / 60, secs % 60 )
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_remember_position_clamps_to_duration() {
        let mut track = Track::new( 1, "Song", "Band", 30, "https://cdn/1.mp3" );
        track.remember_position( 45.0 );
        assert_eq!( track.last_position_secs, Some( 30.0 ) );

        track.remember_position( -3.0 );
        assert_eq!( track.last_position_secs, Some( 0.0 ) );
    }


    #[test]
    fn test_display_name() {
        let track = Track::new( 1, "Song", "Band", 30, "" );
        assert_eq!( track.display_name(), "Band - Song" );

        let untitled = Track::new( 2, "Song", "", 30, "" );
        assert_eq!( untitled.display_name(), "Song" );
    }


    #[test]
    fn test_format_time() {
        assert_eq!( format_time( 0.0 ), "0:00" );
        assert_eq!( format_time( 90.4 ), "1:30" );
        assert_eq!( format_time( -1.0 ), "0:00" );
    }
}
