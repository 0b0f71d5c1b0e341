//! Deezer public API catalog.
//!
//! Only unauthenticated endpoints are used; every track carries a 30 second
//! preview URL that the audio engine can stream.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use tremolo_core::{ Catalog, PlaylistId, PlaylistSummary, Track, TrackId };


/// Errors from the Deezer API.
#[derive( Debug, Error )]
pub enum DeezerError {
    #[error( "Request failed: {0}" )]
    Request( #[from] reqwest::Error ),

    #[error( "API error {kind}: {message}" )]
    Api { kind: String, message: String },
}


/// Error object Deezer returns with a 200 status.
#[derive( Debug, Deserialize )]
struct ApiError {
    #[serde( rename = "type", default )]
    kind: String,
    #[serde( default )]
    message: String,
}


/// Either the payload or `{ "error": { ... } }`.
#[derive( Debug, Deserialize )]
#[serde( untagged )]
enum ApiResponse<T> {
    Error { error: ApiError },
    Ok( T ),
}


#[derive( Debug, Deserialize )]
struct TrackList {
    #[serde( default )]
    data: Vec<DeezerTrack>,
}


#[derive( Debug, Deserialize )]
struct DeezerTrack {
    id: u64,
    title: String,
    #[serde( default )]
    duration: u32,
    /// Preview MP3, empty for tracks without one
    #[serde( default )]
    preview: String,
    artist: Option<DeezerArtist>,
    album: Option<DeezerAlbum>,
}


#[derive( Debug, Deserialize )]
struct DeezerArtist {
    name: String,
}


#[derive( Debug, Deserialize )]
struct DeezerAlbum {
    cover_medium: Option<String>,
}


#[derive( Debug, Deserialize )]
struct PlaylistList {
    #[serde( default )]
    data: Vec<DeezerPlaylist>,
}


#[derive( Debug, Deserialize )]
struct DeezerPlaylist {
    id: u64,
    title: String,
    #[serde( default )]
    nb_tracks: u32,
    picture_medium: Option<String>,
}


impl From<DeezerPlaylist> for PlaylistSummary {
    fn from( p: DeezerPlaylist ) -> Self {
        PlaylistSummary {
            id: PlaylistId( p.id ),
            title: p.title,
            track_count: p.nb_tracks,
            cover_url: p.picture_medium.unwrap_or_default(),
        }
    }
}


impl From<DeezerTrack> for Track {
    fn from( t: DeezerTrack ) -> Self {
        let artist = t.artist.map( |a| a.name ).unwrap_or_default();
        let cover = t.album.and_then( |a| a.cover_medium ).unwrap_or_default();
        Track::new( t.id, t.title, artist, t.duration, t.preview ).with_cover( cover )
    }
}


/// Catalog backed by api.deezer.com.
pub struct DeezerCatalog {
    client: reqwest::Client,
    base_url: String,
}


impl DeezerCatalog {
    pub fn new( client: reqwest::Client, base_url: &str ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches( '/' ).to_string(),
        }
    }


    async fn get<T: DeserializeOwned>( &self, path: &str, query: &[( &str, &str )] ) -> Result<T, DeezerError> {
        let url = format!( "{}{}", self.base_url, path );
        tracing::debug!( "GET {}", url );

        let response = self.client
            .get( &url )
            .query( query )
            .send()
            .await?
            .error_for_status()?;

        match response.json::<ApiResponse<T>>().await? {
            ApiResponse::Ok( body ) => Ok( body ),
            ApiResponse::Error { error } => Err( DeezerError::Api { kind: error.kind, message: error.message } ),
        }
    }


    async fn track_list( &self, what: &str, path: &str, query: &[( &str, &str )] ) -> Vec<Track> {
        match self.get::<TrackList>( path, query ).await {
            Ok( list ) => list.data.into_iter().map( Track::from ).collect(),
            Err( e ) => {
                tracing::error!( "Error fetching {}: {}", what, e );
                Vec::new()
            }
        }
    }
}


#[async_trait]
impl Catalog for DeezerCatalog {
    async fn find_track( &self, id: TrackId ) -> Option<Track> {
        match self.get::<DeezerTrack>( &format!( "/track/{}", id ), &[] ).await {
            Ok( track ) => Some( track.into() ),
            Err( e ) => {
                tracing::error!( "Error fetching track {}: {}", id, e );
                None
            }
        }
    }


    async fn find_playlist_tracks( &self, id: PlaylistId ) -> Vec<Track> {
        self.track_list( "playlist tracks", &format!( "/playlist/{}/tracks", id ), &[] ).await
    }


    async fn search( &self, query: &str ) -> Vec<Track> {
        self.track_list( "search results", "/search", &[ ( "q", query ) ] ).await
    }


    async fn top_tracks( &self ) -> Vec<Track> {
        self.track_list( "top tracks", "/chart/0/tracks", &[] ).await
    }


    async fn top_playlists( &self ) -> Vec<PlaylistSummary> {
        match self.get::<PlaylistList>( "/chart/0/playlists", &[] ).await {
            Ok( list ) => list.data.into_iter().map( PlaylistSummary::from ).collect(),
            Err( e ) => {
                tracing::error!( "Error fetching top playlists: {}", e );
                Vec::new()
            }
        }
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    const TRACK_JSON: &str = r#"{
        "id": 3135556,
        "title": "Harder, Better, Faster, Stronger",
        "duration": 224,
        "preview": "https://cdnt-preview.dzcdn.net/api/1/1/8/e/3/0/8e3.mp3?hdnea=exp=1",
        "artist": { "id": 27, "name": "Daft Punk", "picture_medium": "https://e-cdns-images.dzcdn.net/a.jpg" },
        "album": { "id": 302127, "title": "Discovery", "cover_medium": "https://e-cdns-images.dzcdn.net/c.jpg" }
    }"#;


    #[test]
    fn test_track_maps_to_core_track() {
        let parsed: ApiResponse<DeezerTrack> = serde_json::from_str( TRACK_JSON ).unwrap();
        let track: Track = match parsed {
            ApiResponse::Ok( t ) => t.into(),
            ApiResponse::Error { .. } => panic!( "parsed as error" ),
        };

        assert_eq!( track.id, TrackId( 3135556 ) );
        assert_eq!( track.artist, "Daft Punk" );
        assert_eq!( track.duration_secs, 224 );
        assert_eq!( track.cover_url, "https://e-cdns-images.dzcdn.net/c.jpg" );
        assert!( track.audio_url.ends_with( "hdnea=exp=1" ) );
        assert_eq!( track.last_position_secs, None );
    }


    #[test]
    fn test_error_body_is_recognized() {
        let json = r#"{ "error": { "type": "DataException", "message": "no data", "code": 800 } }"#;
        let parsed: ApiResponse<DeezerTrack> = serde_json::from_str( json ).unwrap();
        match parsed {
            ApiResponse::Error { error } => {
                assert_eq!( error.kind, "DataException" );
                assert_eq!( error.message, "no data" );
            }
            ApiResponse::Ok( _ ) => panic!( "error body parsed as a track" ),
        }

        // A list endpoint must not swallow the error as an empty list
        let parsed: ApiResponse<TrackList> = serde_json::from_str( json ).unwrap();
        assert!( matches!( parsed, ApiResponse::Error { .. } ) );
    }


    #[test]
    fn test_list_tolerates_missing_fields() {
        let json = r#"{ "data": [ { "id": 1, "title": "No preview" } ], "total": 1 }"#;
        let parsed: ApiResponse<TrackList> = serde_json::from_str( json ).unwrap();
        let ApiResponse::Ok( list ) = parsed else { panic!( "parsed as error" ) };
        let tracks: Vec<Track> = list.data.into_iter().map( Track::from ).collect();

        assert_eq!( tracks.len(), 1 );
        assert_eq!( tracks[ 0 ].artist, "" );
        assert_eq!( tracks[ 0 ].audio_url, "" );
        assert_eq!( tracks[ 0 ].duration_secs, 0 );
    }


    #[test]
    fn test_chart_playlists_map_to_summaries() {
        let json = r#"{
            "data": [
                {
                    "id": 1313621735,
                    "title": "Top Worldwide",
                    "public": true,
                    "nb_tracks": 100,
                    "picture_medium": "https://e-cdns-images.dzcdn.net/p.jpg",
                    "user": { "id": 2, "name": "Deezer Charts" },
                    "type": "playlist"
                },
                { "id": 53362031, "title": "Les titres du moment" }
            ],
            "total": 2
        }"#;
        let parsed: ApiResponse<PlaylistList> = serde_json::from_str( json ).unwrap();
        let ApiResponse::Ok( list ) = parsed else { panic!( "parsed as error" ) };
        let playlists: Vec<PlaylistSummary> = list.data.into_iter().map( PlaylistSummary::from ).collect();

        assert_eq!( playlists.len(), 2 );
        assert_eq!( playlists[ 0 ].id, PlaylistId( 1313621735 ) );
        assert_eq!( playlists[ 0 ].title, "Top Worldwide" );
        assert_eq!( playlists[ 0 ].track_count, 100 );
        assert_eq!( playlists[ 0 ].cover_url, "https://e-cdns-images.dzcdn.net/p.jpg" );
        assert_eq!( playlists[ 1 ].track_count, 0 );
        assert_eq!( playlists[ 1 ].cover_url, "" );
    }


    #[test]
    fn test_base_url_trailing_slash() {
        let catalog = DeezerCatalog::new( reqwest::Client::new(), "https://api.deezer.com/" );
        assert_eq!( catalog.base_url, "https://api.deezer.com" );
    }
}
