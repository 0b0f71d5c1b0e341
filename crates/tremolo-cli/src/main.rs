//! Tremolo CLI - Terminal client for streaming music previews

mod cli;
mod deezer;
mod input;
mod settings;
mod view;

use std::fs;
use std::io;
use std::sync::{ Arc, Mutex };
use std::time::{ Duration, Instant };

use anyhow::{ Context, Result };
use clap::Parser;
use crossterm::{
    event::{ self, Event, KeyCode, KeyEventKind },
    terminal::{ disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen },
    ExecutableCommand,
};
use ratatui::{
    prelude::*,
    widgets::{ Block, Borders, List, ListItem, ListState, Paragraph, Wrap },
};
use tokio::runtime::Runtime;
use tokio::sync::{ mpsc, watch };
use tokio::task::JoinHandle;
use tracing_subscriber::{ layer::SubscriberExt, util::SubscriberInitExt, EnvFilter };

use cli::Args;
use deezer::DeezerCatalog;
use input::{ InputBuffer, InputMode };
use settings::Settings;
use view::ViewMode;

use tremolo_core::{
    command, engine_channel, format_time, AudioEngine, Catalog, ChannelObserver, Command, Player,
    PlayerEvent, PlayerHandle, PlayerService, PlayerSnapshot, PlayerStatus, PlaylistId, PlaylistSummary, Track,
    TrackId,
};


/// Volume change per key press.
const VOLUME_STEP: f32 = 0.05;

/// Seek distance for the arrow keys, in seconds.
const SEEK_STEP_SECS: f64 = 5.0;


/// Application state.
struct App {
    runtime: Runtime,
    handle: PlayerHandle,
    snapshots: watch::Receiver<PlayerSnapshot>,
    player_events: mpsc::UnboundedReceiver<PlayerEvent>,
    service_task: Option<JoinHandle<()>>,
    catalog: Arc<dyn Catalog>,
    should_quit: bool,

    // View state
    view_mode: ViewMode,
    list_state: ListState,
    search_title: String,
    search_results: Vec<Track>,
    playlists: Vec<PlaylistSummary>,

    // Input state
    input_mode: InputMode,
    input_buffer: InputBuffer,

    // Help view scroll offset
    help_scroll: u16,

    // Status message (shown in status bar)
    status_message: Option<String>,
    status_clear_at: Option<Instant>,

    settings: Settings,
}


impl App {
    /// Starts the runtime and the player service.
    fn new( args: &Args, settings: Settings ) -> Result<Self> {
        let runtime = Runtime::new().context( "Failed to start async runtime" )?;

        let client = reqwest::Client::builder()
            .timeout( settings.http_timeout() )
            .user_agent( concat!( "tremolo/", env!( "CARGO_PKG_VERSION" ) ) )
            .build()
            .context( "Failed to build HTTP client" )?;

        let catalog: Arc<dyn Catalog> = Arc::new( DeezerCatalog::new( client.clone(), &settings.api_base ) );

        let ( engine_tx, engine_rx ) = engine_channel();
        let engine = AudioEngine::new( runtime.handle().clone(), client, engine_tx );
        let player = Player::new( Box::new( engine ), settings.player_config() );

        let ( mut service, handle, snapshots ) = PlayerService::new( player, Arc::clone( &catalog ), engine_rx );
        let ( observer, player_events ) = ChannelObserver::new();
        service.player_mut().subscribe( Box::new( observer ) );
        let service_task = runtime.spawn( service.run() );

        let mut app = Self {
            runtime,
            handle,
            snapshots,
            player_events,
            service_task: Some( service_task ),
            catalog,
            should_quit: false,
            view_mode: ViewMode::default(),
            list_state: ListState::default(),
            search_title: String::new(),
            search_results: Vec::new(),
            playlists: Vec::new(),
            input_mode: InputMode::Normal,
            input_buffer: InputBuffer::new(),
            help_scroll: 0,
            status_message: None,
            status_clear_at: None,
            settings,
        };

        let startup = if let Some( id ) = args.track {
            Some( Command::Track { id: TrackId( id ) } )
        } else if let Some( id ) = args.playlist {
            Some( Command::Playlist { id: PlaylistId( id ) } )
        } else if args.top {
            Some( Command::Top )
        } else {
            None
        };

        match startup {
            Some( cmd ) => app.execute( cmd ),
            None => app.browse_top(),
        }

        Ok( app )
    }


    /// Sets a status message that auto-clears after a delay.
    fn set_status( &mut self, msg: impl Into<String> ) {
        self.status_message = Some( msg.into() );
        self.status_clear_at = Some( Instant::now() + Duration::from_secs( 3 ) );
    }


    /// Latest player state.
    fn snapshot( &self ) -> PlayerSnapshot {
        self.snapshots.borrow().clone()
    }


    /// Clears expired messages and shows player reports.
    fn tick( &mut self ) {
        if let Some( clear_at ) = self.status_clear_at {
            if Instant::now() >= clear_at {
                self.status_message = None;
                self.status_clear_at = None;
            }
        }

        while let Ok( event ) = self.player_events.try_recv() {
            match event {
                PlayerEvent::Report( report ) => self.set_status( report.to_string() ),
                PlayerEvent::StateChanged( snapshot ) => {
                    if self.view_mode == ViewMode::Queue {
                        let playing = snapshot.current_track
                            .as_ref()
                            .and_then( |t| snapshot.queue.iter().position( |q| q.id == t.id ) );
                        if playing.is_some() && self.list_state.selected().is_none() {
                            self.list_state.select( playing );
                        }
                    }
                }
            }
        }

        if self.service_task.as_ref().map_or( false, |t| t.is_finished() ) && !self.should_quit {
            tracing::error!( "Player service stopped unexpectedly" );
            self.set_status( "Player stopped" );
            self.service_task = None;
        }
    }


    /// Fills the search view with the chart without playing it.
    fn browse_top( &mut self ) {
        let catalog = Arc::clone( &self.catalog );
        let tracks = self.runtime.block_on( async move { catalog.top_tracks().await } );
        self.show_results( "Top tracks", tracks );
    }


    /// Fetches the chart playlists for the playlists view.
    fn fetch_playlists( &mut self ) {
        let catalog = Arc::clone( &self.catalog );
        self.playlists = self.runtime.block_on( async move { catalog.top_playlists().await } );
        if self.playlists.is_empty() {
            self.set_status( "No playlists found" );
        }
    }


    fn show_results( &mut self, title: impl Into<String>, tracks: Vec<Track> ) {
        self.search_title = title.into();
        self.list_state.select( if tracks.is_empty() { None } else { Some( 0 ) } );
        self.search_results = tracks;
    }


    /// Number of rows in the current list view.
    fn list_len( &self ) -> usize {
        match self.view_mode {
            ViewMode::Queue => self.snapshots.borrow().queue.len(),
            ViewMode::Search => self.search_results.len(),
            ViewMode::Liked => self.snapshots.borrow().liked_track_ids.len(),
            ViewMode::Playlists => self.playlists.len(),
            ViewMode::Help => 0,
        }
    }


    fn select_next( &mut self ) {
        let len = self.list_len();
        if len == 0 {
            return;
        }
        let next = self.list_state.selected().map_or( 0, |i| ( i + 1 ).min( len - 1 ) );
        self.list_state.select( Some( next ) );
    }


    fn select_previous( &mut self ) {
        if self.list_len() == 0 {
            return;
        }
        let prev = self.list_state.selected().map_or( 0, |i| i.saturating_sub( 1 ) );
        self.list_state.select( Some( prev ) );
    }


    fn switch_view( &mut self, view: ViewMode ) {
        if view == ViewMode::Playlists && self.playlists.is_empty() {
            self.fetch_playlists();
        }
        self.view_mode = view;
        self.list_state.select( if self.list_len() == 0 { None } else { Some( 0 ) } );
    }


    /// Handles a key event.
    fn handle_key( &mut self, code: KeyCode ) {
        match self.input_mode {
            InputMode::Normal => self.handle_normal_key( code ),
            InputMode::Command | InputMode::Search => self.handle_prompt_key( code ),
        }
    }


    fn handle_normal_key( &mut self, code: KeyCode ) {
        // Global keys (work in any view)
        match code {
            KeyCode::Char( '/' ) => {
                self.input_mode = InputMode::Command;
                self.input_buffer.clear();
                return;
            }
            KeyCode::Char( 's' ) => {
                self.input_mode = InputMode::Search;
                self.input_buffer.clear();
                return;
            }
            KeyCode::Tab => {
                self.switch_view( self.view_mode.next_tab() );
                return;
            }
            KeyCode::BackTab => {
                self.switch_view( self.view_mode.prev_tab() );
                return;
            }
            KeyCode::Char( '?' ) => {
                let next = if self.view_mode == ViewMode::Help { ViewMode::Queue } else { ViewMode::Help };
                self.switch_view( next );
                return;
            }
            KeyCode::Esc if self.view_mode == ViewMode::Help => {
                self.switch_view( ViewMode::Queue );
                return;
            }
            _ => {}
        }

        if self.view_mode == ViewMode::Help {
            match code {
                KeyCode::Up | KeyCode::Char( 'k' ) => self.help_scroll = self.help_scroll.saturating_sub( 1 ),
                KeyCode::Down | KeyCode::Char( 'j' ) => self.help_scroll = self.help_scroll.saturating_add( 1 ),
                _ => {}
            }
            return;
        }

        let snapshot = self.snapshot();
        let cmd = match code {
            KeyCode::Char( 'q' ) => Some( Command::Quit ),
            KeyCode::Char( ' ' ) => Some( Command::Play ),
            KeyCode::Char( 'n' ) => Some( Command::Next ),
            KeyCode::Char( 'p' ) => Some( Command::Prev ),
            KeyCode::Char( 'z' ) => Some( Command::Shuffle ),
            KeyCode::Char( 'r' ) => Some( Command::Repeat ),
            KeyCode::Char( 'l' ) => Some( Command::Like ),
            KeyCode::Char( '+' ) | KeyCode::Char( '=' ) => {
                self.step_volume( &snapshot, VOLUME_STEP );
                None
            }
            KeyCode::Char( '-' ) => {
                self.step_volume( &snapshot, -VOLUME_STEP );
                None
            }
            KeyCode::Left => {
                self.step_seek( &snapshot, -SEEK_STEP_SECS );
                None
            }
            KeyCode::Right => {
                self.step_seek( &snapshot, SEEK_STEP_SECS );
                None
            }
            KeyCode::Up | KeyCode::Char( 'k' ) => {
                self.select_previous();
                None
            }
            KeyCode::Down | KeyCode::Char( 'j' ) => {
                self.select_next();
                None
            }
            KeyCode::Enter if self.view_mode == ViewMode::Search => {
                self.play_selected_result();
                None
            }
            KeyCode::Enter if self.view_mode == ViewMode::Playlists => {
                self.list_state.selected()
                    .and_then( |i| self.playlists.get( i ) )
                    .map( |p| Command::Playlist { id: p.id } )
            }
            KeyCode::Char( 'a' ) if self.view_mode == ViewMode::Search => {
                self.queue_selected_result();
                None
            }
            KeyCode::Char( 'd' ) | KeyCode::Delete if self.view_mode == ViewMode::Liked => {
                self.list_state.selected()
                    .and_then( |i| snapshot.liked_track_ids.get( i ).copied() )
                    .map( |id| Command::Unlike { id: Some( id ) } )
            }
            _ => None,
        };

        if let Some( cmd ) = cmd {
            self.execute( cmd );
        }
    }


    /// Keys while the status line is a prompt.
    fn handle_prompt_key( &mut self, code: KeyCode ) {
        match code {
            KeyCode::Enter => {
                let text = self.input_buffer.take();
                let mode = self.input_mode;
                self.input_mode = InputMode::Normal;
                match mode {
                    InputMode::Command => self.execute_command( &text ),
                    InputMode::Search if !text.trim().is_empty() => {
                        self.execute( Command::Search { term: text.trim().to_string() } );
                    }
                    _ => {}
                }
            }
            KeyCode::Esc => {
                self.input_mode = InputMode::Normal;
                self.input_buffer.clear();
            }
            KeyCode::Backspace => {
                if self.input_buffer.is_empty() {
                    self.input_mode = InputMode::Normal;
                } else {
                    self.input_buffer.backspace();
                }
            }
            KeyCode::Delete => self.input_buffer.delete(),
            KeyCode::Left => self.input_buffer.move_left(),
            KeyCode::Right => self.input_buffer.move_right(),
            KeyCode::Home => self.input_buffer.move_home(),
            KeyCode::End => self.input_buffer.move_end(),
            KeyCode::Char( c ) => self.input_buffer.insert( c ),
            _ => {}
        }
    }


    fn step_volume( &mut self, snapshot: &PlayerSnapshot, delta: f32 ) {
        let level = ( ( snapshot.volume + delta ).clamp( 0.0, 1.0 ) * 100.0 ).round() as u32;
        self.execute( Command::Volume { level: Some( level ) } );
    }


    fn step_seek( &mut self, snapshot: &PlayerSnapshot, delta_secs: f64 ) {
        let Some( track ) = snapshot.current_track.as_ref() else { return };
        if track.duration_secs == 0 {
            return;
        }
        let target = ( snapshot.position_secs + delta_secs ).max( 0.0 );
        let fraction = ( target / track.duration() ).clamp( 0.0, 1.0 );
        if let Err( e ) = self.handle.seek( fraction ) {
            self.set_status( format!( "Error: {}", e ) );
        }
    }


    /// Plays the selected result, keeping the rest of the results queued after it.
    fn play_selected_result( &mut self ) {
        let Some( index ) = self.list_state.selected().filter( |i| *i < self.search_results.len() ) else {
            return;
        };
        let mut tracks = self.search_results.clone();
        tracks.rotate_left( index );
        if let Err( e ) = self.handle.load_tracks( tracks ) {
            self.set_status( format!( "Error: {}", e ) );
        }
    }


    fn queue_selected_result( &mut self ) {
        let Some( track ) = self.list_state.selected().and_then( |i| self.search_results.get( i ) ).cloned() else {
            return;
        };
        let name = track.display_name();
        match self.handle.add_to_queue( track ) {
            Ok(()) => self.set_status( format!( "Queued {}", name ) ),
            Err( e ) => self.set_status( format!( "Error: {}", e ) ),
        }
    }


    fn execute_command( &mut self, input: &str ) {
        match Command::parse( input ) {
            Ok( cmd ) => self.execute( cmd ),
            Err( e ) => self.set_status( format!( "{}", e ) ),
        }
    }


    fn execute( &mut self, cmd: Command ) {
        if let Err( e ) = self.run_command( cmd ) {
            self.set_status( format!( "Error: {}", e ) );
        }
    }


    fn run_command( &mut self, cmd: Command ) -> Result<()> {
        tracing::debug!( "{}: {:?}", cmd.description(), cmd );

        match cmd {
            Command::Track { id } => {
                self.handle.load_track_by_id( id )?;
                self.set_status( format!( "Loading track {}", id ) );
            }
            Command::Playlist { id } => {
                self.handle.load_playlist_by_id( id )?;
                self.set_status( format!( "Loading playlist {}", id ) );
            }
            Command::Playlists => {
                // Refetched on every request, the chart changes
                self.playlists.clear();
                self.switch_view( ViewMode::Playlists );
            }
            Command::Top => {
                let catalog = Arc::clone( &self.catalog );
                let tracks = self.runtime.block_on( async move { catalog.top_tracks().await } );
                if tracks.is_empty() {
                    self.set_status( "No tracks found" );
                } else {
                    self.show_results( "Top tracks", tracks.clone() );
                    self.handle.load_tracks( tracks )?;
                }
            }
            Command::Search { term } => {
                let catalog = Arc::clone( &self.catalog );
                let query = term.clone();
                let tracks = self.runtime.block_on( async move { catalog.search( &query ).await } );
                self.set_status( format!( "{} results for \"{}\"", tracks.len(), term ) );
                self.show_results( format!( "Results for \"{}\"", term ), tracks );
                self.view_mode = ViewMode::Search;
            }
            Command::Queue { id } => {
                self.handle.add_to_queue_by_id( id )?;
            }
            Command::Play => self.handle.toggle_play_pause()?,
            Command::Next => self.handle.play_next()?,
            Command::Prev => self.handle.play_previous()?,
            Command::Seek { target } => {
                let snapshot = self.snapshot();
                let duration = snapshot.current_track.as_ref().map_or( 0, |t| t.duration_secs );
                match target.fraction_of( duration ) {
                    Some( fraction ) => self.handle.seek( fraction )?,
                    None => self.set_status( "Current track has no known duration" ),
                }
            }
            Command::Shuffle => {
                self.handle.shuffle_queue()?;
                self.set_status( "Queue shuffled" );
            }
            Command::Repeat => self.handle.toggle_repeat_one()?,
            Command::Volume { level } => match level {
                Some( level ) => {
                    let level = level.min( 100 );
                    self.handle.set_volume( level as f32 / 100.0 )?;
                    self.settings.volume = level as f32 / 100.0;
                    self.set_status( format!( "Volume: {}%", level ) );
                }
                None => {
                    let volume = self.snapshot().volume;
                    self.set_status( format!( "Volume: {}%", ( volume * 100.0 ).round() as u32 ) );
                }
            },
            Command::Like => {
                if self.snapshot().current_track.is_none() {
                    self.set_status( "Nothing is playing" );
                } else {
                    self.handle.add_to_liked_songs()?;
                }
            }
            Command::Unlike { id } => {
                let id = id.or_else( || self.snapshot().current_track.map( |t| t.id ) );
                match id {
                    Some( id ) => self.handle.remove_from_liked_songs( id )?,
                    None => self.set_status( "Nothing is playing" ),
                }
            }
            Command::Help => self.switch_view( ViewMode::Help ),
            Command::Quit => self.should_quit = true,
        }

        Ok(())
    }


    /// Stops the player, waits for it to release audio and saves settings.
    fn shutdown( mut self ) {
        if let Err( e ) = self.handle.shutdown() {
            tracing::debug!( "Shutdown request not delivered: {}", e );
        }
        if let Some( task ) = self.service_task.take() {
            let waited = self.runtime.block_on( async {
                tokio::time::timeout( Duration::from_secs( 2 ), task ).await
            });
            if waited.is_err() {
                tracing::warn!( "Player service did not stop in time" );
            }
        }

        self.settings.volume = self.snapshot().volume;
        self.settings.save();
        self.runtime.shutdown_timeout( Duration::from_millis( 500 ) );
    }
}


/// Sends logs to a file since the terminal belongs to the UI.
fn init_logging() -> Result<()> {
    let Some( dir ) = dirs::data_local_dir().map( |p| p.join( "tremolo" ) ) else {
        return Ok(());
    };
    fs::create_dir_all( &dir )?;
    let file = fs::OpenOptions::new()
        .create( true )
        .append( true )
        .open( dir.join( "tremolo.log" ) )?;

    tracing_subscriber::registry()
        .with( EnvFilter::try_from_default_env().unwrap_or_else( |_| EnvFilter::new( "tremolo=info" ) ) )
        .with( tracing_subscriber::fmt::layer().with_writer( Mutex::new( file ) ).with_ansi( false ) )
        .init();

    Ok(())
}


fn main() -> Result<()> {
    let args = Args::parse();

    if let Err( e ) = init_logging() {
        eprintln!( "Logging disabled: {}", e );
    }

    let settings = Settings::load();
    let mut app = App::new( &args, settings )?;
    tracing::info!( "Tremolo started" );

    // Setup terminal
    enable_raw_mode()?;
    io::stdout().execute( EnterAlternateScreen )?;
    let mut terminal = Terminal::new( CrosstermBackend::new( io::stdout() ) )?;

    let result = run( &mut terminal, &mut app );

    // Cleanup
    disable_raw_mode()?;
    io::stdout().execute( LeaveAlternateScreen )?;

    app.shutdown();
    tracing::info!( "Tremolo stopped" );
    result
}


/// Main loop.
fn run( terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App ) -> Result<()> {
    loop {
        app.tick();

        terminal.draw( |frame| draw_ui( frame, app ) )?;

        if event::poll( Duration::from_millis( 100 ) )? {
            if let Event::Key( key ) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.handle_key( key.code );
                }
            }
        }

        if app.should_quit {
            return Ok(());
        }
    }
}


/// Draws the main UI.
fn draw_ui( frame: &mut Frame, app: &mut App ) {
    let snapshot = app.snapshot();
    let area = frame.area();

    let chunks = Layout::default()
        .direction( Direction::Vertical )
        .constraints([
            Constraint::Length( 2 ),  // Header
            Constraint::Min( 0 ),     // Main content
            Constraint::Length( 5 ),  // Now playing
            Constraint::Length( 1 ),  // Status bar
        ])
        .split( area );

    let header = Paragraph::new( format!( "  TREMOLO - {}", app.view_mode.title() ) )
        .style( Style::default().fg( Color::Magenta ).bold() )
        .block( Block::default().borders( Borders::BOTTOM ) );
    frame.render_widget( header, chunks[0] );

    match app.view_mode {
        ViewMode::Queue => draw_queue( frame, app, &snapshot, chunks[1] ),
        ViewMode::Search => draw_search( frame, app, &snapshot, chunks[1] ),
        ViewMode::Liked => draw_liked( frame, app, &snapshot, chunks[1] ),
        ViewMode::Playlists => draw_playlists( frame, app, chunks[1] ),
        ViewMode::Help => draw_help( frame, app, chunks[1] ),
    }

    draw_now_playing( frame, &snapshot, chunks[2] );
    draw_status_bar( frame, app, chunks[3] );
}


/// List row for a track, marking the one that is playing.
fn track_item( track: &Track, snapshot: &PlayerSnapshot ) -> ListItem<'static> {
    let current = snapshot.current_track.as_ref().map_or( false, |c| c.id == track.id );
    let liked = if snapshot.liked_track_ids.contains( &track.id ) { " ♥" } else { "" };
    let text = format!(
        "{}{}  {}{}",
        if current { "▶ " } else { "  " },
        track.display_name(),
        format_time( track.duration() ),
        liked,
    );

    let style = if current { Style::default().fg( Color::Magenta ) } else { Style::default() };
    ListItem::new( text ).style( style )
}


fn draw_track_list( frame: &mut Frame, app: &mut App, items: Vec<ListItem<'static>>, title: String, area: Rect ) {
    let list = List::new( items )
        .block( Block::default().title( title ).borders( Borders::ALL ) )
        .highlight_style( Style::default().bg( Color::DarkGray ) )
        .highlight_symbol( ">> " );

    frame.render_stateful_widget( list, area, &mut app.list_state );
}


fn draw_queue( frame: &mut Frame, app: &mut App, snapshot: &PlayerSnapshot, area: Rect ) {
    let items = snapshot.queue.iter().map( |t| track_item( t, snapshot ) ).collect();
    let title = format!(
        " Queue ({}) {}",
        snapshot.queue.len(),
        if snapshot.repeat_one { "[R1] " } else { "" },
    );
    draw_track_list( frame, app, items, title, area );
}


fn draw_search( frame: &mut Frame, app: &mut App, snapshot: &PlayerSnapshot, area: Rect ) {
    let items = app.search_results.iter().map( |t| track_item( t, snapshot ) ).collect();
    let title = if app.search_title.is_empty() {
        " Search ".to_string()
    } else {
        format!( " {} ({}) ", app.search_title, app.search_results.len() )
    };
    draw_track_list( frame, app, items, title, area );
}


fn draw_liked( frame: &mut Frame, app: &mut App, snapshot: &PlayerSnapshot, area: Rect ) {
    // Only ids are kept for liked songs; names come from whatever is loaded
    let items = snapshot.liked_track_ids
        .iter()
        .map( |id| {
            let known = snapshot.queue.iter()
                .chain( app.search_results.iter() )
                .find( |t| t.id == *id );
            match known {
                Some( track ) => track_item( track, snapshot ),
                None => ListItem::new( format!( "  Track {}", id ) ),
            }
        })
        .collect();
    let title = format!( " Liked songs ({}) ", snapshot.liked_track_ids.len() );
    draw_track_list( frame, app, items, title, area );
}


fn draw_playlists( frame: &mut Frame, app: &mut App, area: Rect ) {
    let items = app.playlists
        .iter()
        .map( |p| ListItem::new( format!( "  {}  ({} tracks)", p.title, p.track_count ) ) )
        .collect();
    let title = format!( " Chart playlists ({}) ", app.playlists.len() );
    draw_track_list( frame, app, items, title, area );
}


fn draw_help( frame: &mut Frame, app: &mut App, area: Rect ) {
    let help_text = command::help_text();
    let line_count = help_text.lines().count() as u16;
    let visible_height = area.height.saturating_sub( 2 );

    let max_scroll = line_count.saturating_sub( visible_height );
    if app.help_scroll > max_scroll {
        app.help_scroll = max_scroll;
    }

    let help = Paragraph::new( help_text )
        .block( Block::default()
            .title( " Help (↑↓ scroll, ? or Esc to close) " )
            .borders( Borders::ALL )
        )
        .wrap( Wrap { trim: false } )
        .scroll(( app.help_scroll, 0 ));

    frame.render_widget( help, area );
}


fn draw_now_playing( frame: &mut Frame, snapshot: &PlayerSnapshot, area: Rect ) {
    let state_str = match snapshot.status {
        PlayerStatus::Playing => "▶",
        PlayerStatus::Paused => "⏸",
        PlayerStatus::Loading => "…",
        PlayerStatus::Idle => "■",
    };

    let ( title, artist, duration ) = match snapshot.current_track.as_ref() {
        Some( track ) => ( track.title.clone(), track.artist.clone(), track.duration() ),
        None => ( "No track".to_string(), String::new(), 0.0 ),
    };

    let progress_width = 20;
    let filled = ( snapshot.progress_fraction.clamp( 0.0, 1.0 ) * progress_width as f64 ).round() as usize;
    let bar = format!(
        "[{}{}]",
        "━".repeat( filled ),
        "─".repeat( progress_width - filled )
    );

    let mut heading = format!( " {} {} ", state_str, title );
    if snapshot.current_is_liked() {
        heading.push( '♥' );
    }

    let mut lines = vec![
        Line::from( Span::styled( heading, Style::default().bold() ) ),
    ];

    if !artist.is_empty() {
        lines.push( Line::from( Span::styled( format!( "   {} ", artist ), Style::default().fg( Color::Gray ) ) ) );
    }

    let vol_pct = ( snapshot.volume * 100.0 ).round() as i32;
    let vol_str = if vol_pct == 0 { "🔇".to_string() } else { format!( "🔊{}%", vol_pct ) };
    let repeat = if snapshot.repeat_one { " 🔂" } else { "" };

    lines.push( Line::from( format!(
        " {} {} / {}  {}{} ",
        bar,
        format_time( snapshot.position_secs ),
        format_time( duration ),
        vol_str,
        repeat,
    )));

    let now_playing = Paragraph::new( lines )
        .block( Block::default().title( " Now Playing " ).borders( Borders::ALL ) );

    frame.render_widget( now_playing, area );
}


fn draw_status_bar( frame: &mut Frame, app: &App, area: Rect ) {
    let ( text, style ) = match app.input_mode {
        InputMode::Command | InputMode::Search => (
            format!( "{}{}", app.input_mode.prompt(), app.input_buffer.content() ),
            Style::default().fg( Color::Yellow ),
        ),
        InputMode::Normal => match app.status_message {
            Some( ref msg ) => ( msg.clone(), Style::default().fg( Color::Green ) ),
            None => ( app.view_mode.hint().to_string(), Style::default().fg( Color::DarkGray ) ),
        },
    };

    let status = Paragraph::new( text ).style( style );
    frame.render_widget( status, area );

    if app.input_mode != InputMode::Normal {
        let offset = app.input_mode.prompt().chars().count() + app.input_buffer.cursor();
        frame.set_cursor_position(( area.x + offset as u16, area.y ));
    }
}
