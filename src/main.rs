use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info, warn};

use diagnostic_assistant::config::Config;
use diagnostic_assistant::credential::{clear_api_key, set_api_key};
use diagnostic_assistant::dashboard::DashboardSummary;
use diagnostic_assistant::models::{
    Analysis, AnalysisResult, ImageModality, Notification, Patient, PatientStatus,
};
use diagnostic_assistant::patients::{
    recent_visits, register_patient, status_counts, upcoming_appointments, NewPatient,
    PatientFilter,
};
use diagnostic_assistant::profile::{Profile, ProfileUpdate};
use diagnostic_assistant::request::UploadedFile;
use diagnostic_assistant::submitter::Submission;
use diagnostic_assistant::workflow::{analyses_for_patient, find_analysis, run_analysis};
use diagnostic_assistant::App;

/// Diagnostic assistant: patient records and AI-assisted image analysis
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file (default: ~/.diagnostic-assistant/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Record store directory, overriding the config file
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register and browse patients
    #[command(subcommand)]
    Patients(PatientsCommand),

    /// Submit images and notes for analysis
    Analyze {
        /// Patient identifier
        #[arg(short, long)]
        patient_id: String,

        /// Image type: xray, mri, ct, ultrasound, pathology, other
        #[arg(short, long, default_value = "xray")]
        image_type: ImageModality,

        /// Clinical notes
        #[arg(short, long, default_value = "")]
        notes: String,

        /// Files to upload (only images are sent for analysis)
        files: Vec<PathBuf>,
    },

    /// Browse stored analyses
    #[command(subcommand)]
    Analyses(AnalysesCommand),

    /// List notifications
    Notifications {
        /// Only unread notifications
        #[arg(long)]
        unread: bool,
    },

    /// Summary counts and recent analyses
    Dashboard,

    /// View or edit the clinician profile
    #[command(subcommand)]
    Profile(ProfileCommand),

    /// API key settings
    #[command(subcommand)]
    Settings(SettingsCommand),
}

#[derive(Subcommand, Debug)]
enum PatientsCommand {
    /// List patients
    List {
        /// Search name, id or condition
        #[arg(short, long, default_value = "")]
        search: String,

        /// Status filter: all, active, referred, discharged
        #[arg(long, default_value = "all")]
        status: String,
    },
    /// Register a new patient
    Add(AddPatientArgs),
    /// Patients with upcoming appointments
    Upcoming,
    /// Most recent visits
    Recent {
        #[arg(long, default_value = "3")]
        limit: usize,
    },
}

#[derive(ClapArgs, Debug)]
struct AddPatientArgs {
    #[arg(long)]
    first_name: String,
    #[arg(long)]
    last_name: String,
    /// Date of birth (YYYY-MM-DD)
    #[arg(long)]
    dob: NaiveDate,
    #[arg(long)]
    gender: String,
    #[arg(long, default_value = "")]
    condition: String,
    /// Upcoming appointment (YYYY-MM-DD)
    #[arg(long)]
    appointment: Option<NaiveDate>,
    #[arg(long)]
    phone: Option<String>,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    address: Option<String>,
    /// Patient has given consent for data processing
    #[arg(long)]
    consent: bool,
}

#[derive(Subcommand, Debug)]
enum AnalysesCommand {
    /// List analyses, newest first
    List {
        #[arg(short, long)]
        patient: Option<String>,
    },
    /// Show one analysis in full
    Show { id: String },
}

#[derive(Subcommand, Debug)]
enum ProfileCommand {
    Show,
    Set(ProfileArgs),
}

#[derive(ClapArgs, Debug)]
struct ProfileArgs {
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    specialty: Option<String>,
    #[arg(long)]
    license: Option<String>,
    #[arg(long)]
    phone: Option<String>,
    #[arg(long)]
    hospital: Option<String>,
    #[arg(long)]
    department: Option<String>,
    #[arg(long)]
    bio: Option<String>,
    #[arg(long)]
    notify_email: Option<bool>,
    #[arg(long)]
    notify_app: Option<bool>,
    #[arg(long)]
    notify_text: Option<bool>,
}

#[derive(Subcommand, Debug)]
enum SettingsCommand {
    /// Show whether an API key is configured
    Show,
    /// Store a Gemini API key
    SetApiKey { key: String },
    /// Remove the API key (analyses become simulated)
    ClearApiKey,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config_path = match args.config {
        Some(ref path) => path.clone(),
        None => Config::config_path()?,
    };
    let mut config = Config::load(&config_path)?;
    if let Some(ref dir) = args.data_dir {
        config.data_dir = Some(dir.clone());
    }

    let app = App::open(config)?;
    let today = Local::now().date_naive();

    match args.command {
        Command::Patients(command) => patients(&app, command, today),
        Command::Analyze {
            patient_id,
            image_type,
            notes,
            files,
        } => analyze(&app, &patient_id, image_type, &notes, files).await,
        Command::Analyses(command) => analyses(&app, command),
        Command::Notifications { unread } => {
            notifications(&app, unread);
            Ok(())
        }
        Command::Dashboard => {
            dashboard(&app);
            Ok(())
        }
        Command::Profile(command) => profile(&app, command),
        Command::Settings(command) => settings(&app, command),
    }
}

fn patients(app: &App, command: PatientsCommand, today: NaiveDate) -> Result<()> {
    let all = app.store.read_list::<Patient>();

    match command {
        PatientsCommand::List { search, status } => {
            let status = match status.to_lowercase().as_str() {
                "all" => None,
                other => Some(other.parse::<PatientStatus>().map_err(anyhow::Error::msg)?),
            };
            let filter = PatientFilter {
                query: search,
                status,
            };
            let found = filter.apply(&all);
            if found.is_empty() {
                println!("No patients found matching your search criteria.");
            }
            for patient in &found {
                print_patient(patient);
            }
            let counts = status_counts(&all);
            println!(
                "\nShowing {} of {} patients ({} active, {} referred, {} discharged)",
                found.len(),
                all.len(),
                counts[&PatientStatus::Active],
                counts[&PatientStatus::Referred],
                counts[&PatientStatus::Discharged],
            );
        }
        PatientsCommand::Add(add) => {
            let form = NewPatient {
                first_name: add.first_name,
                last_name: add.last_name,
                date_of_birth: Some(add.dob),
                gender: add.gender,
                condition: add.condition,
                phone: add.phone,
                email: add.email,
                address: add.address,
                upcoming_appointment: add.appointment,
                consent: add.consent,
            };
            let patient = register_patient(&app.store, form, today)?;
            println!("Patient registered:");
            print_patient(&patient);
            for (label, value) in [
                ("Phone", &patient.phone),
                ("Email", &patient.email),
                ("Address", &patient.address),
            ] {
                if let Some(value) = value {
                    println!("           {}: {}", label, value);
                }
            }
        }
        PatientsCommand::Upcoming => {
            let upcoming = upcoming_appointments(&all);
            if upcoming.is_empty() {
                println!("No upcoming appointments scheduled.");
            }
            for patient in upcoming {
                if let Some(date) = patient.upcoming_appointment {
                    println!(
                        "  {}  {} ({}) - {} [{}]",
                        date, patient.name, patient.id, patient.condition, patient.status
                    );
                }
            }
        }
        PatientsCommand::Recent { limit } => {
            for patient in recent_visits(&all, limit) {
                println!(
                    "  {} ({}) - last visit {} - {}",
                    patient.name, patient.id, patient.last_visit, patient.condition
                );
            }
        }
    }
    Ok(())
}

fn print_patient(patient: &Patient) {
    println!(
        "  {:<8} {:<24} {:>3}, {:<8} {:<11} {}",
        patient.id,
        patient.name,
        patient.age,
        patient.gender,
        patient.status.as_str(),
        patient.condition
    );
}

async fn analyze(
    app: &App,
    patient_id: &str,
    image_type: ImageModality,
    notes: &str,
    paths: Vec<PathBuf>,
) -> Result<()> {
    let files: Vec<UploadedFile> = paths.iter().map(|p| UploadedFile::from_path(p)).collect();

    for file in files.iter().filter(|f| !f.is_image()) {
        warn!("{} ({}) is not an image and will not be sent", file.name, file.mime_type);
    }

    if !app.credential.is_configured() {
        println!("No API key configured; running a simulated analysis.");
    }

    let submitter = app.submitter()?;
    let mut submission = Submission::new(patient_id, notes, image_type, files);
    match run_analysis(&app.store, &submitter, &mut submission).await {
        Ok(analysis) => {
            info!(analysis_id = %analysis.id, "Analysis saved");
            print_analysis(&analysis);
            Ok(())
        }
        Err(e) => {
            error!("Failed to analyze medical data: {}", e);
            Err(e).context("Failed to analyze medical data. Please try again.")
        }
    }
}

fn analyses(app: &App, command: AnalysesCommand) -> Result<()> {
    match command {
        AnalysesCommand::List { patient } => {
            let list = match patient {
                Some(ref id) => analyses_for_patient(&app.store, id),
                None => {
                    let mut all = app.store.read_list::<Analysis>();
                    all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                    all
                }
            };
            if list.is_empty() {
                println!("No analyses recorded.");
            }
            for analysis in &list {
                println!(
                    "  {}  {}  {:<8} {:<10} {}",
                    analysis.id,
                    analysis.created_at.format("%Y-%m-%d %H:%M"),
                    analysis.patient_id,
                    analysis.image_type.label(),
                    analysis.result.headline()
                );
            }
            Ok(())
        }
        AnalysesCommand::Show { id } => {
            let analysis = find_analysis(&app.store, &id)
                .with_context(|| format!("No analysis with id {}", id))?;
            print_analysis(&analysis);
            Ok(())
        }
    }
}

fn print_analysis(analysis: &Analysis) {
    println!("\n--- Analysis {} ---", analysis.id);
    println!("Patient:    {}", analysis.patient_id);
    println!("Date:       {}", analysis.created_at.to_rfc3339());
    println!("Image type: {}", analysis.image_type.label());
    if !analysis.notes.trim().is_empty() {
        println!("Notes:      {}", analysis.notes.trim());
    }
    println!();

    match &analysis.result {
        AnalysisResult::Simulated(findings) => {
            println!(
                "Primary diagnosis: {} ({:.0}% confidence)",
                findings.diagnosis,
                findings.confidence * 100.0
            );
            print_section("Alternative diagnoses", &findings.alternatives);
            print_section("Key findings", &findings.findings);
            print_section("Recommended follow-up", &findings.recommendations);
        }
        AnalysisResult::Generated { text } => println!("{}", text.trim()),
    }
}

fn print_section(title: &str, items: &[String]) {
    println!("\n{}:", title);
    for item in items {
        println!("  - {}", item);
    }
}

fn notifications(app: &App, unread_only: bool) {
    let mut list = app.store.read_list::<Notification>();
    list.retain(|n| !unread_only || !n.read);
    list.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

    if list.is_empty() {
        println!("No notifications.");
    }
    for notification in list {
        let marker = if notification.read { " " } else { "*" };
        println!(
            "{} {}  {}: {}",
            marker,
            notification.timestamp.format("%Y-%m-%d %H:%M"),
            notification.title,
            notification.message
        );
    }
}

fn dashboard(app: &App) {
    let summary = DashboardSummary::load(&app.store);
    let profile = Profile::load(&app.store);

    if !profile.name.is_empty() {
        println!("Welcome back, {}.", profile.name);
    }
    println!("Total patients:         {}", summary.total_patients);
    println!("Pending analyses:       {}", summary.pending_analyses);
    println!("Completed diagnostics:  {}", summary.completed_analyses);
    println!("Unread notifications:   {}", summary.unread_notifications);
    println!("Saved cases:            {}", summary.saved_cases);

    if !summary.recent_analyses.is_empty() {
        println!("\nRecent analyses:");
        for analysis in &summary.recent_analyses {
            println!(
                "  {}  {}  {}",
                analysis.id,
                analysis.patient_id,
                analysis.result.headline()
            );
        }
    }
}

fn profile(app: &App, command: ProfileCommand) -> Result<()> {
    let mut profile = Profile::load(&app.store);
    match command {
        ProfileCommand::Show => {}
        ProfileCommand::Set(set) => {
            let update = ProfileUpdate {
                name: set.name,
                email: set.email,
                specialty: set.specialty,
                license: set.license,
                phone: set.phone,
                hospital: set.hospital,
                department: set.department,
                bio: set.bio,
                notifications_email: set.notify_email,
                notifications_app: set.notify_app,
                notifications_text: set.notify_text,
            };
            if update.is_empty() {
                println!("Nothing to change.");
                return Ok(());
            }
            update.apply(&mut profile);
            profile.save(&app.store)?;
            println!("Profile updated successfully");
        }
    }
    println!("{}", serde_json::to_string_pretty(&profile)?);
    Ok(())
}

fn settings(app: &App, command: SettingsCommand) -> Result<()> {
    match command {
        SettingsCommand::Show => {
            if app.credential.is_configured() {
                println!("Gemini API key: {}", app.credential.masked());
            } else {
                println!("Gemini API key: not configured (analyses are simulated)");
            }
            println!("Endpoint:       {}/{}", app.config.endpoint, app.config.model);
        }
        SettingsCommand::SetApiKey { key } => {
            set_api_key(&app.store, &key)?;
            println!("API key saved successfully");
        }
        SettingsCommand::ClearApiKey => {
            clear_api_key(&app.store)?;
            println!("API key removed");
        }
    }
    Ok(())
}
