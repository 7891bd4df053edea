use std::error::Error;
use std::path::PathBuf;

use clap::Parser;

use traffic_assign::find_ue;
use traffic_assign::find_ue_fw;
use traffic_assign::load_columns;
use traffic_assign::output_columns;
use traffic_assign::output_link_performance;
use traffic_assign::Assignment;
use traffic_assign::AssignmentMode;
use traffic_assign::AssignmentSettings;
use traffic_assign::FrankWolfeOptions;


#[derive(Parser)]
#[command(author, version, about = "static user-equilibrium traffic assignment on a GMNS network")]
struct CliArgs {
    /// directory holding settings.yml, node.csv, link.csv and the demand files
    #[arg(long, default_value = ".")]
    input_dir: PathBuf,
    /// where to write the results; defaults to the input directory
    #[arg(long)]
    output_dir: Option<PathBuf>,
    /// start from the paths in route_assignment.csv instead of the demand files
    #[arg(long)]
    load_columns: bool,
}

fn run(args: &CliArgs) -> Result<(), Box<dyn Error>> {
    let settings = AssignmentSettings::from_file(&args.input_dir.join("settings.yml"))?;
    let mut assignment = Assignment::from_settings(&settings)?;
    if args.load_columns {
        load_columns(&mut assignment, &args.input_dir)?;
    } else {
        let summary = assignment.read_demand_files(&settings)?;
        log::info!("total valid demand is {}", summary.valid_volume);
    }

    let output_dir = args.output_dir.clone().unwrap_or(args.input_dir.clone());
    match settings.mode()? {
        AssignmentMode::ColumnGeneration => {
            let column_gen_num = if args.load_columns { 0 } else { settings.column_gen_num };
            let report = find_ue(&mut assignment, column_gen_num, settings.column_update_num,
                                 settings.rel_gap_tolerance)?;
            if let Some(gap) = report.final_relative_gap() {
                log::info!("final relative gap is {:.6}", gap);
            }
            output_columns(&assignment, &output_dir)?;
        }
        AssignmentMode::FrankWolfe => {
            let options = FrankWolfeOptions {
                max_iter_num: settings.max_iter_num,
                line_search: settings.line_search,
                rel_gap_tolerance: settings.rel_gap_tolerance,
                ..FrankWolfeOptions::default()
            };
            let report = find_ue_fw(&mut assignment, &options)?;
            if let Some(gap) = report.final_relative_gap() {
                log::info!("final relative gap is {:.6}", gap);
            }
        }
    }
    output_link_performance(&assignment, &output_dir)?;
    return Ok(());
}

fn main() {
    env_logger::init();
    let args = CliArgs::parse();
    if let Err(err) = run(&args) {
        log::error!("{}", err);
        std::process::exit(1);
    }
}
