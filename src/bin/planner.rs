use std::path::PathBuf;

use chrono::NaiveDateTime;
use clap::{Parser, Subcommand};

use flexoplan::config::PlannerSettings;
use flexoplan::model::{Machine, MachineStatus, SchedulableOrder};
use flexoplan::report;
use flexoplan::service::SchedulingService;
use flexoplan::store::{InMemoryStore, Store};

#[derive(Parser, Debug)]
#[command(about = "Plan and inspect production sequences for a flexo printing fleet.")]
#[command(next_line_help = true)]
struct Args {
    /// Settings file (JSON); defaults apply for every missing field.
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Seed for the sequencer RNG; overrides the settings file.
    #[arg(long)]
    seed: Option<u64>,

    /// Planning start timestamp, e.g. 2026-03-02T08:00:00. Defaults to now.
    #[arg(long)]
    start: Option<NaiveDateTime>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Rebuild the queue of one machine (by id, name or pseudonym).
    Schedule {
        machine: String,

        /// Write the persisted queue to this CSV file afterwards.
        #[arg(short, long)]
        export: Option<PathBuf>,
    },
    /// Re-plan every active machine, moving orders across compatible
    /// machines first.
    ScheduleAll,
    /// Move an order to the front of its machine's queue.
    Prioritize {
        order_id: i64,

        /// Re-optimize the unlocked remainder of the queue.
        #[arg(short, long, default_value_t = false)]
        reoptimize: bool,
    },
    /// Recompute delivery dates for a manually reordered queue.
    Recalculate { machine: String },
}

fn main() {
    simple_logger::init_with_level(log::Level::Info).unwrap();

    let cli = Args::parse();

    let mut settings = match &cli.settings {
        Some(path) => match report::load_settings(path) {
            Ok(settings) => settings,
            Err(why) => {
                log::error!("{why}");
                std::process::exit(1);
            }
        },
        None => PlannerSettings::default(),
    };
    if cli.seed.is_some() {
        settings.seed = cli.seed;
    }

    let start = cli
        .start
        .unwrap_or_else(|| chrono::Local::now().naive_local());
    let service = SchedulingService::new(demo_store(), settings);

    let response = match cli.command {
        Commands::Schedule { machine, export } => {
            let response = service.generate_optimal_schedule(&machine, start);
            if response.success {
                if let Some(path) = export {
                    match export_queue(&service, &machine, &path) {
                        Ok(rows) => log::info!("{rows} queue rows written to {}", path.display()),
                        Err(why) => log::error!("{why}"),
                    }
                }
            }
            response
        }
        Commands::ScheduleAll => service.generate_optimal_schedule_all_machines(true, start),
        Commands::Prioritize {
            order_id,
            reoptimize,
        } => {
            // a prioritization only makes sense against an existing queue
            for machine in demo_machine_names(&service) {
                let built = service.generate_optimal_schedule(&machine, start);
                if !built.success {
                    log::warn!("{}", built.message);
                }
            }
            service.prioritize_order(order_id, reoptimize)
        }
        Commands::Recalculate { machine } => {
            let built = service.generate_optimal_schedule(&machine, start);
            if !built.success {
                log::warn!("{}", built.message);
            }
            service.recalculate_delivery_dates(&machine, start)
        }
    };

    println!(
        "{}",
        serde_json::to_string_pretty(&response).expect("response envelope serializes")
    );
    if !response.success {
        std::process::exit(1);
    }
}

fn export_queue(
    service: &SchedulingService<InMemoryStore>,
    machine_ref: &str,
    path: &std::path::Path,
) -> Result<usize, String> {
    let machine = match machine_ref.trim().parse::<i64>() {
        Ok(id) => service.store().get_machine_by_id(id),
        Err(_) => service.store().get_machine_by_name_or_pseudonym(machine_ref),
    }
    .map_err(|why| why.to_string())?
    .ok_or_else(|| format!("Machine '{machine_ref}' not found."))?;

    let rows = service
        .store()
        .get_production_queue_for_machine(machine.id)
        .map_err(|why| why.to_string())?;
    report::write_queue_csv(path, &rows).map_err(|why| why.to_string())?;
    Ok(rows.len())
}

fn demo_machine_names(service: &SchedulingService<InMemoryStore>) -> Vec<String> {
    service
        .store()
        .get_all_machine_status()
        .map(|machines| machines.into_iter().map(|m| m.name).collect())
        .unwrap_or_default()
}

/// A small demo fleet with a mixed backlog, in the spirit of the seeded
/// database the planner was originally developed against.
fn demo_store() -> InMemoryStore {
    let machines = vec![
        Machine {
            id: 1,
            name: String::from("FX-1"),
            pseudonym: Some(String::from("narrow press")),
            inks: 8,
            functional_inks: 4,
            avg_velocity: 150.0,
            time_change_units: 15.0,
            status: MachineStatus::Active,
            share_rolls: Some(String::from("[7]")),
        },
        Machine {
            id: 7,
            name: String::from("FX-7"),
            pseudonym: Some(String::from("wide press")),
            inks: 10,
            functional_inks: 8,
            avg_velocity: 180.0,
            time_change_units: 12.0,
            status: MachineStatus::Active,
            share_rolls: None,
        },
        Machine {
            id: 9,
            name: String::from("FX-9"),
            pseudonym: None,
            inks: 6,
            functional_inks: 6,
            avg_velocity: 120.0,
            time_change_units: 18.0,
            status: MachineStatus::Maintenance,
            share_rolls: Some(String::from("[1, 7]")),
        },
    ];

    let backlog = [
        // (id, machine, meters, labels, days_remaining, forced_in_days, colors, materials, customer)
        (101, 1, 4200.0, 2, Some(12), None, r#"["C", "M", "Y", "K"]"#, r#"["BOPP"]"#, Some(7)),
        (102, 1, 1500.0, 1, Some(4), None, r#"["C", "M"]"#, r#"["BOPP"]"#, Some(7)),
        (103, 1, 8800.0, 3, Some(-2), None, r#"["C", "M", "Y", "K", "W", "G"]"#, r#"["PET"]"#, Some(3)),
        (104, 1, 2400.0, 1, Some(25), Some(2), r#"["K"]"#, r#"["PAPER"]"#, None),
        (105, 7, 6100.0, 2, Some(9), None, r#"["C", "M", "Y"]"#, r#"["BOPP"]"#, Some(5)),
        (106, 7, 900.0, 1, Some(1), None, r#"["K", "W"]"#, r#"["PET"]"#, Some(5)),
        (107, 7, 3300.0, 4, Some(18), None, r#"["C", "M", "Y", "K", "O"]"#, r#"["BOPP"]"#, None),
        (108, 7, 500.0, 1, Some(40), Some(5), r#"["M"]"#, r#"["PAPER"]"#, Some(2)),
    ];

    let today = chrono::Local::now().naive_local();
    let orders = backlog
        .into_iter()
        .map(
            |(id, machine_id, meters, labels, days, forced, colors, materials, customer)| {
                SchedulableOrder {
                    id,
                    product_id: id,
                    product_name: format!("label run {id}"),
                    status: 2,
                    delivery_date: days
                        .and_then(|d: i64| today.checked_add_signed(chrono::Duration::days(d))),
                    forced_delivery_date: forced
                        .and_then(|d: i64| today.checked_add_signed(chrono::Duration::days(d))),
                    planning_priority: 0,
                    days_remaining: days,
                    total_print_meters: meters,
                    labels,
                    colors_json: Some(colors.to_string()),
                    materials_json: Some(materials.to_string()),
                    customer_json: customer
                        .map(|c: i64| format!(r#"{{"customer_id": {c}}}"#)),
                    total_net_weight: meters / 100.0,
                    machine_id: Some(machine_id),
                }
            },
        )
        .collect();

    InMemoryStore::new(machines, orders)
}
