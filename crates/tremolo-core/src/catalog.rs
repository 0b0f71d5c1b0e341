//! Track catalog contract.
//!
//! Implementations swallow transport errors and return an empty result, so
//! callers cannot tell "not found" from "unreachable". Both are handled the
//! same way.

use async_trait::async_trait;

use crate::track::{ PlaylistId, PlaylistSummary, Track, TrackId };


/// Resolves identifiers and queries to playable tracks.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn find_track( &self, id: TrackId ) -> Option<Track>;

    /// Tracks of a playlist in playlist order, possibly empty.
    async fn find_playlist_tracks( &self, id: PlaylistId ) -> Vec<Track>;

    async fn search( &self, query: &str ) -> Vec<Track>;

    /// Current chart, used as the home screen.
    async fn top_tracks( &self ) -> Vec<Track>;

    /// Featured playlists to browse.
    async fn top_playlists( &self ) -> Vec<PlaylistSummary>;
}


/// In-memory catalog.
#[derive( Debug, Clone, Default )]
pub struct StaticCatalog {
    tracks: Vec<Track>,
    playlists: Vec<StaticPlaylist>,
}


#[derive( Debug, Clone )]
struct StaticPlaylist {
    id: PlaylistId,
    title: String,
    track_ids: Vec<TrackId>,
}


impl StaticCatalog {
    pub fn new( tracks: Vec<Track> ) -> Self {
        Self { tracks, playlists: Vec::new() }
    }


    /// Registers a playlist, replacing one with the same id. Unknown track
    /// ids are skipped when it is resolved.
    pub fn with_playlist( mut self, id: PlaylistId, title: impl Into<String>, track_ids: Vec<TrackId> ) -> Self {
        self.playlists.retain( |p| p.id != id );
        self.playlists.push( StaticPlaylist { id, title: title.into(), track_ids } );
        self
    }


    fn get( &self, id: TrackId ) -> Option<&Track> {
        self.tracks.iter().find( |t| t.id == id )
    }
}


#[async_trait]
impl Catalog for StaticCatalog {
    async fn find_track( &self, id: TrackId ) -> Option<Track> {
        self.get( id ).cloned()
    }


    async fn find_playlist_tracks( &self, id: PlaylistId ) -> Vec<Track> {
        self.playlists
            .iter()
            .find( |p| p.id == id )
            .map( |p| p.track_ids.iter().filter_map( |&id| self.get( id ).cloned() ).collect() )
            .unwrap_or_default()
    }


    async fn search( &self, query: &str ) -> Vec<Track> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return Vec::new();
        }
        self.tracks
            .iter()
            .filter( |t| {
                t.title.to_lowercase().contains( &query ) || t.artist.to_lowercase().contains( &query )
            })
            .cloned()
            .collect()
    }


    async fn top_tracks( &self ) -> Vec<Track> {
        self.tracks.clone()
    }


    /// Registered playlists in registration order.
    async fn top_playlists( &self ) -> Vec<PlaylistSummary> {
        self.playlists
            .iter()
            .map( |p| PlaylistSummary {
                id: p.id,
                title: p.title.clone(),
                track_count: p.track_ids.iter().filter( |&&id| self.get( id ).is_some() ).count() as u32,
                cover_url: String::new(),
            })
            .collect()
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    fn catalog() -> StaticCatalog {
        StaticCatalog::new( vec![
            Track::new( 1, "Blue Monday", "New Order", 30, "https://cdn/1.mp3" ),
            Track::new( 2, "Ceremony", "New Order", 30, "https://cdn/2.mp3" ),
            Track::new( 3, "Atmosphere", "Joy Division", 30, "https://cdn/3.mp3" ),
        ])
        .with_playlist( PlaylistId( 10 ), "Manchester", vec![ TrackId( 3 ), TrackId( 99 ), TrackId( 1 ) ] )
        .with_playlist( PlaylistId( 20 ), "Empty", Vec::new() )
    }


    #[tokio::test]
    async fn test_find_track() {
        let catalog = catalog();
        assert_eq!( catalog.find_track( TrackId( 2 ) ).await.map( |t| t.title ), Some( "Ceremony".into() ) );
        assert!( catalog.find_track( TrackId( 7 ) ).await.is_none() );
    }


    #[tokio::test]
    async fn test_playlist_keeps_order_and_skips_unknown() {
        let tracks = catalog().find_playlist_tracks( PlaylistId( 10 ) ).await;
        let ids: Vec<u64> = tracks.iter().map( |t| t.id.0 ).collect();
        assert_eq!( ids, vec![ 3, 1 ] );
        assert!( catalog().find_playlist_tracks( PlaylistId( 11 ) ).await.is_empty() );
    }


    #[tokio::test]
    async fn test_search_matches_title_and_artist() {
        let catalog = catalog();
        assert_eq!( catalog.search( "new order" ).await.len(), 2 );
        assert_eq!( catalog.search( "ATMOS" ).await.len(), 1 );
        assert!( catalog.search( "  " ).await.is_empty() );
    }


    #[tokio::test]
    async fn test_top_playlists_lists_registered_playlists() {
        let playlists = catalog().top_playlists().await;
        let listed: Vec<( u64, &str, u32 )> = playlists
            .iter()
            .map( |p| ( p.id.0, p.title.as_str(), p.track_count ) )
            .collect();
        assert_eq!( listed, vec![ ( 10, "Manchester", 2 ), ( 20, "Empty", 0 ) ] );
    }


    #[tokio::test]
    async fn test_reregistering_playlist_replaces_it() {
        let catalog = catalog().with_playlist( PlaylistId( 10 ), "Renamed", vec![ TrackId( 2 ) ] );
        let playlists = catalog.top_playlists().await;
        assert_eq!( playlists.len(), 2 );
        assert_eq!( playlists[ 1 ].title, "Renamed" );
        assert_eq!( catalog.find_playlist_tracks( PlaylistId( 10 ) ).await.len(), 1 );
    }
}
