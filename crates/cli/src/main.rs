use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use telecare_core::constants::DEFAULT_DATA_DIR;
use telecare_core::triage::BlockedTriage;
use telecare_core::{
    ActorId, ActorRole, AddendumCategory, ClinicalFields, ConsultationId, ConsultationService,
    ConsultationStatus, CoreConfig, IntakeSubmission, MembershipId, NewAddendum, NonEmptyText,
    PersonId, QueueEntry, QueueFilter, RedFlag, RedFlagSelections, Session, StaticDirectory,
    StoreKind, Vitals,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "telecare")]
#[command(about = "Telecare consultation CLI")]
struct Cli {
    /// Data directory holding consultations, audit events and directory.yaml
    #[arg(long, global = true, env = "TELECARE_DATA_DIR", default_value = DEFAULT_DATA_DIR)]
    data_dir: PathBuf,

    #[command(flatten)]
    caller: CallerArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Who is running the command.
#[derive(Args)]
struct CallerArgs {
    /// Actor id (32 hex characters)
    #[arg(long, global = true, env = "TELECARE_ACTOR_ID")]
    actor_id: Option<String>,
    /// Display name recorded on addenda
    #[arg(long, global = true, env = "TELECARE_ACTOR_NAME")]
    actor_name: Option<String>,
    /// patient, clinician or admin
    #[arg(long, global = true, env = "TELECARE_ACTOR_ROLE", default_value = "clinician")]
    role: String,
    /// Membership id; required for patients
    #[arg(long, global = true, env = "TELECARE_MEMBERSHIP_ID")]
    membership_id: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the red flags screened at intake
    RedFlags,
    /// Submit an intake on behalf of a person
    Submit {
        /// Subject person id
        person_id: String,
        /// Chief complaint in the patient's words
        complaint: String,
        /// Red-flag code (repeatable)
        #[arg(long = "flag")]
        flags: Vec<String>,
        /// Confirm none of the listed emergency symptoms apply
        #[arg(long)]
        none_apply: bool,
        /// Confirm the patient is in a supported location
        #[arg(long)]
        location_ok: bool,
    },
    /// Show the queue, oldest first
    Queue {
        /// Comma-separated statuses (default: pending,in_progress)
        #[arg(long)]
        status: Option<String>,
        /// Only consultations assigned to the caller
        #[arg(long)]
        mine: bool,
    },
    /// Print the queue again after every change until interrupted
    Watch,
    /// Claim a pending consultation
    Claim { consultation_id: String },
    /// Save working clinical fields
    Draft {
        consultation_id: String,
        #[command(flatten)]
        fields: FieldArgs,
    },
    /// Complete a consultation with final clinical fields
    Complete {
        consultation_id: String,
        #[command(flatten)]
        fields: FieldArgs,
    },
    /// Cancel an open consultation
    Cancel { consultation_id: String },
    /// Append an addendum to a completed consultation
    Addendum {
        consultation_id: String,
        body: String,
        /// general, correction, clarification or follow_up
        #[arg(long, default_value = "general")]
        category: String,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Print the clinician chart as JSON
    Chart { consultation_id: String },
    /// Print the patient-facing summary as JSON
    Summary { consultation_id: String },
    /// Print recent audit events
    Audit {
        consultation_id: String,
        #[arg(long)]
        limit: Option<usize>,
    },
}

#[derive(Args)]
struct FieldArgs {
    #[arg(long, default_value = "")]
    diagnosis: String,
    #[arg(long, default_value = "")]
    summary: String,
    #[arg(long, default_value = "")]
    plan: String,
    #[arg(long, default_value = "")]
    notes: String,
    /// Temperature in Fahrenheit
    #[arg(long)]
    temp: Option<f64>,
    /// Heart rate in beats per minute
    #[arg(long)]
    hr: Option<u16>,
    /// Respiratory rate in breaths per minute
    #[arg(long)]
    rr: Option<u16>,
    /// Blood pressure as systolic/diastolic, e.g. 128/84
    #[arg(long)]
    bp: Option<String>,
    /// Oxygen saturation percent
    #[arg(long)]
    spo2: Option<f64>,
    #[arg(long)]
    weight_kg: Option<f64>,
}

impl FieldArgs {
    fn into_fields(self) -> Result<ClinicalFields, Box<dyn std::error::Error>> {
        let (systolic_mmhg, diastolic_mmhg) = match self.bp.as_deref() {
            Some(bp) => {
                let (sys, dia) = bp
                    .split_once('/')
                    .ok_or_else(|| format!("blood pressure '{bp}' must look like 120/80"))?;
                (Some(sys.trim().parse()?), Some(dia.trim().parse()?))
            }
            None => (None, None),
        };
        let vitals = Vitals {
            temperature_f: self.temp,
            heart_rate_bpm: self.hr,
            respiratory_rate: self.rr,
            systolic_mmhg,
            diastolic_mmhg,
            oxygen_saturation_pct: self.spo2,
            weight_kg: self.weight_kg,
            recorded_at: None,
        };
        Ok(ClinicalFields {
            diagnosis: self.diagnosis,
            clinical_summary: self.summary,
            treatment_plan: self.plan,
            internal_notes: self.notes,
            vitals: (!vitals.is_empty()).then_some(vitals),
        })
    }
}

impl CallerArgs {
    fn session(&self) -> Result<Session, Box<dyn std::error::Error>> {
        let actor_id: ActorId = self
            .actor_id
            .as_deref()
            .ok_or("--actor-id (or TELECARE_ACTOR_ID) is required")?
            .parse()?;
        let role: ActorRole = self.role.parse()?;
        let name = NonEmptyText::new(self.actor_name.as_deref().unwrap_or(role.as_str()))?;
        let membership_id = self
            .membership_id
            .as_deref()
            .map(MembershipId::parse)
            .transpose()?;
        if role == ActorRole::Patient && membership_id.is_none() {
            return Err("patients must pass --membership-id".into());
        }
        Ok(Session::new(actor_id, name, role, membership_id))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("Use 'telecare --help' for commands");
        return Ok(());
    };
    if let Commands::RedFlags = command {
        for flag in RedFlag::ALL {
            println!("{:<30} {:<14} {}", flag.code(), flag.category().as_str(), flag.label());
        }
        println!("\n{}", BlockedTriage::GUIDANCE);
        return Ok(());
    }

    let session = cli.caller.session()?;
    let cfg = Arc::new(CoreConfig::with_defaults(cli.data_dir));
    let directory = Arc::new(StaticDirectory::load(&cfg.directory_file())?);
    let service = ConsultationService::open(cfg, StoreKind::File, directory).await?;

    match command {
        Commands::RedFlags => {}
        Commands::Submit {
            person_id,
            complaint,
            flags,
            none_apply,
            location_ok,
        } => {
            let membership_id = session
                .membership_id()
                .ok_or("--membership-id is required to submit")?;
            let mut red_flags = RedFlagSelections::default();
            for code in &flags {
                red_flags.insert(code.parse::<RedFlag>()?);
            }
            let submission = IntakeSubmission {
                membership_id,
                person_id: PersonId::parse(&person_id)?,
                chief_complaint: complaint,
                red_flags,
                none_apply_confirmed: none_apply,
                location_acknowledged: location_ok,
            };
            let id = service
                .submit_consultation_request(&session, submission)
                .await?;
            println!("Submitted consultation: {}", id);
        }
        Commands::Queue { status, mine } => {
            let mut filter = match status {
                Some(list) => QueueFilter::with_statuses(
                    list.split(',')
                        .map(str::parse::<ConsultationStatus>)
                        .collect::<Result<Vec<_>, _>>()?,
                ),
                None => QueueFilter::default(),
            };
            if mine {
                filter = filter.assigned_to(session.actor_id());
            }
            print_queue(&service.list_queue(&session, Some(filter)).await?);
        }
        Commands::Watch => {
            let mut subscription = service.subscribe_queue(&session, None)?;
            loop {
                tokio::select! {
                    snapshot = subscription.next() => match snapshot {
                        Some(entries) => {
                            println!("--- {}", chrono::Utc::now().format("%H:%M:%S"));
                            print_queue(&entries?);
                        }
                        None => break,
                    },
                    _ = tokio::signal::ctrl_c() => {
                        subscription.cancel();
                        break;
                    }
                }
            }
        }
        Commands::Claim { consultation_id } => {
            let id: ConsultationId = consultation_id.parse()?;
            service.claim(&session, id).await?;
            println!("Claimed consultation: {}", id);
        }
        Commands::Draft {
            consultation_id,
            fields,
        } => {
            let id: ConsultationId = consultation_id.parse()?;
            service.save_draft(&session, id, fields.into_fields()?).await?;
            println!("Saved draft for consultation: {}", id);
        }
        Commands::Complete {
            consultation_id,
            fields,
        } => {
            let id: ConsultationId = consultation_id.parse()?;
            service.complete(&session, id, fields.into_fields()?).await?;
            println!("Completed consultation: {}", id);
        }
        Commands::Cancel { consultation_id } => {
            let id: ConsultationId = consultation_id.parse()?;
            service.cancel(&session, id).await?;
            println!("Cancelled consultation: {}", id);
        }
        Commands::Addendum {
            consultation_id,
            body,
            category,
            reason,
        } => {
            let id: ConsultationId = consultation_id.parse()?;
            let input = NewAddendum {
                body,
                category: category.parse::<AddendumCategory>()?,
                reason,
            };
            let addendum_id = service.add_addendum(&session, id, input).await?;
            println!("Added addendum {} to consultation {}", addendum_id, id);
        }
        Commands::Chart { consultation_id } => {
            let id: ConsultationId = consultation_id.parse()?;
            let chart = service.clinician_chart(&session, id).await?;
            println!("{}", serde_json::to_string_pretty(&chart)?);
        }
        Commands::Summary { consultation_id } => {
            let id: ConsultationId = consultation_id.parse()?;
            let chart = service.patient_chart(&session, id).await?;
            println!("{}", serde_json::to_string_pretty(&chart)?);
        }
        Commands::Audit {
            consultation_id,
            limit,
        } => {
            let id: ConsultationId = consultation_id.parse()?;
            for view in service.audit_events(&session, id, limit).await? {
                let event = view.event;
                let current = view
                    .current_role
                    .map(|r| r.to_string())
                    .unwrap_or_else(|| "unknown".into());
                println!(
                    "{} {:<22} actor={} role={} (now {})",
                    event.timestamp.to_rfc3339(),
                    event.action.as_str(),
                    event.actor_id,
                    event.actor_role,
                    current
                );
            }
        }
    }

    let failures = service.audit_write_failures();
    if failures > 0 {
        eprintln!("warning: {failures} audit event(s) could not be written");
    }

    Ok(())
}

fn print_queue(entries: &[QueueEntry]) {
    if entries.is_empty() {
        println!("Queue is empty.");
        return;
    }
    for entry in entries {
        let assigned = entry
            .assigned_clinician_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".into());
        println!(
            "ID: {}, Status: {}, Created: {}, Assigned: {}, Complaint: {}",
            entry.id,
            entry.status,
            entry.created_at.to_rfc3339(),
            assigned,
            entry.chief_complaint
        );
    }
}
