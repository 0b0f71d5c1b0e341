//! The queue of tracks eligible for next/previous navigation.
//!
//! Navigation always wraps: stepping past the last track lands on the first
//! and stepping back from the first lands on the last.

use rand::Rng;

use crate::track::{ Track, TrackId };


/// Ordered list of tracks currently in play.
#[derive( Debug, Clone, Default, PartialEq )]
pub struct Queue {
    tracks: Vec<Track>,
}


impl Queue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }


    /// Replaces the whole queue.
    pub fn replace( &mut self, tracks: Vec<Track> ) {
        self.tracks = tracks;
    }


    /// Appends a track unless one with the same id is already queued.
    ///
    /// @returns true if the track was appended
    pub fn push_unique( &mut self, track: Track ) -> bool {
        if self.contains( track.id ) {
            return false;
        }
        self.tracks.push( track );
        true
    }


    /// Returns true if a track with this id is queued.
    pub fn contains( &self, id: TrackId ) -> bool {
        self.position_of( id ).is_some()
    }


    /// Index of the first track with this id.
    pub fn position_of( &self, id: TrackId ) -> Option<usize> {
        self.tracks.iter().position( |t| t.id == id )
    }


    /// Track that follows `current`, wrapping to the start.
    ///
    /// A `current` that is absent or not queued counts as index -1, so the
    /// first track is returned.
    pub fn next_after( &self, current: Option<TrackId> ) -> Option<&Track> {
        if self.tracks.is_empty() {
            return None;
        }
        let next = match current.and_then( |id| self.position_of( id ) ) {
            Some( index ) => ( index + 1 ) % self.tracks.len(),
            None => 0,
        };
        self.tracks.get( next )
    }


    /// Track that precedes `current`, wrapping to the end.
    ///
    /// A `current` that is absent or not queued counts as index -1, so the
    /// second-to-last track is returned (or the only one).
    pub fn previous_before( &self, current: Option<TrackId> ) -> Option<&Track> {
        let len = self.tracks.len();
        if len == 0 {
            return None;
        }
        let prev = match current.and_then( |id| self.position_of( id ) ) {
            Some( index ) => ( index + len - 1 ) % len,
            None => ( len + len - 2 ) % len,
        };
        self.tracks.get( prev )
    }


    /// Shuffles the queue in place with the thread-local generator.
    pub fn shuffle( &mut self ) {
        self.shuffle_with( &mut rand::thread_rng() );
    }


    /// Fisher-Yates shuffle: for i from the last index down to 1, swap i with
    /// a uniformly chosen index in 0..=i.
    pub fn shuffle_with<R: Rng + ?Sized>( &mut self, rng: &mut R ) {
        for i in ( 1..self.tracks.len() ).rev() {
            let j = rng.gen_range( 0..=i );
            self.tracks.swap( i, j );
        }
    }


    /// Stores the last-known position on the queued copy of a track.
    pub fn remember_position( &mut self, id: TrackId, position_secs: f64 ) {
        if let Some( track ) = self.tracks.iter_mut().find( |t| t.id == id ) {
            track.remember_position( position_secs );
        }
    }


    /// Gets all queued tracks.
    pub fn tracks( &self ) -> &[Track] {
        &self.tracks
    }


    /// Gets the track at an index.
    pub fn get( &self, index: usize ) -> Option<&Track> {
        self.tracks.get( index )
    }


    /// Gets the number of tracks.
    pub fn len( &self ) -> usize {
        self.tracks.len()
    }


    /// Returns true if the queue is empty.
    pub fn is_empty( &self ) -> bool {
        self.tracks.is_empty()
    }
}


#[cfg( test )]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;


    fn queue_of( ids: &[u64] ) -> Queue {
        let mut queue = Queue::new();
        queue.replace( ids.iter().map( |&id| Track::new( id, format!( "t{}", id ), "a", 10, "" ) ).collect() );
        queue
    }


    fn ids( queue: &Queue ) -> Vec<u64> {
        queue.tracks().iter().map( |t| t.id.0 ).collect()
    }


    #[test]
    fn test_next_wraps_to_start() {
        let queue = queue_of( &[ 1, 2, 3 ] );
        assert_eq!( queue.next_after( Some( TrackId( 1 ) ) ).map( |t| t.id ), Some( TrackId( 2 ) ) );
        assert_eq!( queue.next_after( Some( TrackId( 3 ) ) ).map( |t| t.id ), Some( TrackId( 1 ) ) );
    }


    #[test]
    fn test_next_from_unknown_track_starts_at_first() {
        let queue = queue_of( &[ 1, 2, 3 ] );
        assert_eq!( queue.next_after( None ).map( |t| t.id ), Some( TrackId( 1 ) ) );
        assert_eq!( queue.next_after( Some( TrackId( 9 ) ) ).map( |t| t.id ), Some( TrackId( 1 ) ) );
    }


    #[test]
    fn test_previous_wraps_to_end() {
        let queue = queue_of( &[ 1, 2, 3 ] );
        assert_eq!( queue.previous_before( Some( TrackId( 1 ) ) ).map( |t| t.id ), Some( TrackId( 3 ) ) );
        assert_eq!( queue.previous_before( Some( TrackId( 2 ) ) ).map( |t| t.id ), Some( TrackId( 1 ) ) );
    }


    #[test]
    fn test_previous_from_unknown_track() {
        let queue = queue_of( &[ 1, 2, 3 ] );
        // index -1 steps back to len - 2
        assert_eq!( queue.previous_before( None ).map( |t| t.id ), Some( TrackId( 2 ) ) );

        let single = queue_of( &[ 7 ] );
        assert_eq!( single.previous_before( None ).map( |t| t.id ), Some( TrackId( 7 ) ) );
    }


    #[test]
    fn test_navigation_on_empty_queue() {
        let queue = Queue::new();
        assert!( queue.next_after( None ).is_none() );
        assert!( queue.previous_before( Some( TrackId( 1 ) ) ).is_none() );
    }


    #[test]
    fn test_push_unique_is_idempotent() {
        let mut queue = queue_of( &[ 1, 2 ] );
        assert!( !queue.push_unique( Track::new( 2, "dup", "a", 10, "" ) ) );
        assert!( queue.push_unique( Track::new( 3, "new", "a", 10, "" ) ) );
        assert_eq!( ids( &queue ), vec![ 1, 2, 3 ] );
    }


    #[test]
    fn test_shuffle_preserves_tracks() {
        let mut queue = queue_of( &[ 1, 2, 3, 4, 5, 6, 7, 8 ] );
        let mut rng = StdRng::seed_from_u64( 42 );
        queue.shuffle_with( &mut rng );

        let mut shuffled = ids( &queue );
        shuffled.sort_unstable();
        assert_eq!( shuffled, vec![ 1, 2, 3, 4, 5, 6, 7, 8 ] );
    }


    #[test]
    fn test_shuffle_is_deterministic_for_seed() {
        let mut a = queue_of( &[ 1, 2, 3, 4, 5 ] );
        let mut b = queue_of( &[ 1, 2, 3, 4, 5 ] );
        a.shuffle_with( &mut StdRng::seed_from_u64( 7 ) );
        b.shuffle_with( &mut StdRng::seed_from_u64( 7 ) );
        assert_eq!( ids( &a ), ids( &b ) );
    }


    #[test]
    fn test_shuffle_reaches_every_position() {
        // Every track should land at index 0 for some seed.
        let mut firsts = std::collections::HashSet::new();
        for seed in 0..200 {
            let mut queue = queue_of( &[ 1, 2, 3, 4 ] );
            queue.shuffle_with( &mut StdRng::seed_from_u64( seed ) );
            firsts.insert( queue.tracks()[ 0 ].id.0 );
        }
        assert_eq!( firsts.len(), 4 );
    }


    #[test]
    fn test_remember_position() {
        let mut queue = queue_of( &[ 1, 2 ] );
        queue.remember_position( TrackId( 2 ), 4.5 );
        assert_eq!( queue.get( 1 ).and_then( |t| t.last_position_secs ), Some( 4.5 ) );
        assert_eq!( queue.get( 0 ).and_then( |t| t.last_position_secs ), None );
    }
}
