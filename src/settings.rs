use std::error::Error;
use std::path::Path;
use std::path::PathBuf;

use yaml_rust::Yaml;
use yaml_rust::YamlLoader;

use super::config_utils;
use super::AssignmentError;
use super::AssignmentMode;
use super::LengthUnit;
use super::ShortestPathAlgorithm;
use super::SpeedUnit;


#[derive(Clone, Debug, PartialEq)]
pub struct AgentSettings {
    pub name: String,
    pub description: String,
    /// value of time in dollars per hour
    pub vot: f64,
    /// passenger-car equivalents per traveller
    pub pce: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PeriodSettings {
    pub name: String,
    /// formatted as "HHMM_HHMM"
    pub time_period: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DemandFileSettings {
    pub file_name: String,
    pub period: String,
    pub agent_type: String,
}

/// Everything a run reads from settings.yml.  Counts are kept signed so that negative values can
/// be reported by `validate` instead of being lost in parsing.
#[derive(Clone, Debug, PartialEq)]
pub struct AssignmentSettings {
    pub agents: Vec<AgentSettings>,
    pub demand_periods: Vec<PeriodSettings>,
    pub demand_files: Vec<DemandFileSettings>,
    pub mode: String,
    pub column_gen_num: i64,
    pub column_update_num: i64,
    pub max_iter_num: i64,
    pub rel_gap_tolerance: Option<f64>,
    pub line_search: bool,
    pub sp_algorithm: String,
    pub length_unit: String,
    pub speed_unit: String,
    /// directory that relative file names are resolved against
    pub base_dir: PathBuf,
}

impl Default for AssignmentSettings {
    fn default() -> AssignmentSettings {
        return AssignmentSettings {
            agents: vec![AgentSettings {
                name: String::from("a"),
                description: String::from("auto"),
                vot: 10.,
                pce: 1.,
            }],
            demand_periods: vec![PeriodSettings {
                name: String::from("AM"),
                time_period: String::from("0700_0800"),
            }],
            demand_files: vec![DemandFileSettings {
                file_name: String::from("demand.csv"),
                period: String::from("AM"),
                agent_type: String::from("a"),
            }],
            mode: String::from("column_generation"),
            column_gen_num: 10,
            column_update_num: 10,
            max_iter_num: 40,
            rel_gap_tolerance: None,
            line_search: true,
            sp_algorithm: String::from("deque"),
            length_unit: String::from("mile"),
            speed_unit: String::from("mph"),
            base_dir: PathBuf::from("."),
        };
    }
}

impl AssignmentSettings {
    /// Reads settings from a yaml file.  A missing file is not an error: the defaults are used
    /// with `base_dir` set to the file's directory.
    pub fn from_file(path: &Path) -> Result<AssignmentSettings, Box<dyn Error>> {
        let base_dir = match path.parent() {
            Some(dir) => dir.to_path_buf(),
            None => PathBuf::from("."),
        };
        if !path.exists() {
            log::warn!("{} not found, using default settings", path.display());
            let mut settings = AssignmentSettings::default();
            settings.base_dir = base_dir;
            return Ok(settings);
        }
        let contents = std::fs::read_to_string(path)?;
        return AssignmentSettings::from_yaml_str(&contents, &base_dir);
    }

    pub fn from_yaml_str(contents: &str, base_dir: &Path)
                         -> Result<AssignmentSettings, Box<dyn Error>> {
        let docs = YamlLoader::load_from_str(contents)?;
        let mut settings = AssignmentSettings::default();
        settings.base_dir = base_dir.to_path_buf();
        let yaml_cfg = match docs.get(0) {
            Some(doc) => doc,
            None => {
                log::warn!("settings file is empty, using default settings");
                return Ok(settings);
            }
        };

        if let Some(agents) = yaml_cfg["agents"].as_vec() {
            settings.agents = agents.iter().map(agent_from_yaml).collect::<Result<_, _>>()?;
        }
        if let Some(periods) = yaml_cfg["demand_periods"].as_vec() {
            settings.demand_periods = periods.iter().map(period_from_yaml).
                collect::<Result<_, _>>()?;
        }
        if let Some(files) = yaml_cfg["demand_files"].as_vec() {
            settings.demand_files = files.iter().map(demand_file_from_yaml).
                collect::<Result<_, _>>()?;
        }

        let asgn_cfg = &yaml_cfg["assignment"];
        if !asgn_cfg.is_badvalue() {
            if let Some(mode) = config_utils::yaml_as_string(&asgn_cfg["mode"]) {
                settings.mode = mode;
            }
            if let Some(num) = asgn_cfg["column_gen_num"].as_i64() {
                settings.column_gen_num = num;
            }
            if let Some(num) = asgn_cfg["column_update_num"].as_i64() {
                settings.column_update_num = num;
            }
            if let Some(num) = asgn_cfg["max_iter_num"].as_i64() {
                settings.max_iter_num = num;
            }
            settings.rel_gap_tolerance = config_utils::yaml_as_f64(&asgn_cfg["rel_gap_tolerance"]);
            if let Some(line_search) = asgn_cfg["line_search"].as_bool() {
                settings.line_search = line_search;
            }
            if let Some(algo) = config_utils::yaml_as_string(&asgn_cfg["sp_algorithm"]) {
                settings.sp_algorithm = algo;
            }
        }

        let net_cfg = &yaml_cfg["network"];
        if !net_cfg.is_badvalue() {
            if let Some(unit) = config_utils::yaml_as_string(&net_cfg["length_unit"]) {
                settings.length_unit = unit;
            }
            if let Some(unit) = config_utils::yaml_as_string(&net_cfg["speed_unit"]) {
                settings.speed_unit = unit;
            }
        }

        return Ok(settings);
    }

    /// Rejects configurations that no run could use.  Called once before anything is loaded.
    pub fn validate(&self) -> Result<(), AssignmentError> {
        self.mode()?;
        self.sp_algorithm()?;
        self.length_unit()?;
        self.speed_unit()?;
        for (name, value) in &[("column_gen_num", self.column_gen_num),
                               ("column_update_num", self.column_update_num),
                               ("max_iter_num", self.max_iter_num)] {
            if *value < 0 {
                return Err(AssignmentError::NegativeIterations{name: name.to_string(),
                                                               value: *value});
            }
        }
        if let Some(tol) = self.rel_gap_tolerance {
            if !(tol >= 0.) {
                return Err(AssignmentError::InvalidSettings(
                    format!("rel_gap_tolerance must be non-negative, but got {}", tol)));
            }
        }
        if self.agents.is_empty() {
            return Err(AssignmentError::InvalidSettings(String::from("no agent types")));
        }
        if self.demand_periods.is_empty() {
            return Err(AssignmentError::InvalidSettings(String::from("no demand periods")));
        }
        for agent in &self.agents {
            if !(agent.vot > 0.) || !(agent.pce > 0.) {
                return Err(AssignmentError::InvalidSettings(
                    format!("agent type {} needs a positive vot and pce", agent.name)));
            }
        }
        for period in &self.demand_periods {
            if config_utils::get_num_minutes_from_time_period(&period.time_period).is_none() {
                return Err(AssignmentError::InvalidSettings(
                    format!("bad time period {} for {}", period.time_period, period.name)));
            }
        }
        for file in &self.demand_files {
            if !self.agents.iter().any(|aa| aa.name == file.agent_type) {
                return Err(AssignmentError::UnknownAgentType(file.agent_type.clone()));
            }
            if !self.demand_periods.iter().any(|pp| pp.name == file.period) {
                return Err(AssignmentError::UnknownDemandPeriod(file.period.clone()));
            }
        }
        return Ok(());
    }

    pub fn mode(&self) -> Result<AssignmentMode, AssignmentError> {
        return self.mode.parse();
    }

    pub fn sp_algorithm(&self) -> Result<ShortestPathAlgorithm, AssignmentError> {
        return self.sp_algorithm.parse();
    }

    pub fn length_unit(&self) -> Result<LengthUnit, AssignmentError> {
        return self.length_unit.parse();
    }

    pub fn speed_unit(&self) -> Result<SpeedUnit, AssignmentError> {
        return self.speed_unit.parse();
    }

    pub fn resolve_path(&self, file_name: &str) -> PathBuf {
        return config_utils::str_to_absolute_path(file_name, &self.base_dir);
    }
}

fn agent_from_yaml(yaml: &Yaml) -> Result<AgentSettings, AssignmentError> {
    let name = config_utils::yaml_as_string(&yaml["type"]).
        ok_or(AssignmentError::InvalidSettings(String::from("agent without a type")))?;
    let description = config_utils::yaml_as_string(&yaml["name"]).unwrap_or(name.clone());
    return Ok(AgentSettings {
        name,
        description,
        vot: config_utils::yaml_as_f64(&yaml["vot"]).unwrap_or(10.),
        pce: config_utils::yaml_as_f64(&yaml["pce"]).unwrap_or(1.),
    });
}

fn period_from_yaml(yaml: &Yaml) -> Result<PeriodSettings, AssignmentError> {
    let name = config_utils::yaml_as_string(&yaml["period"]).
        ok_or(AssignmentError::InvalidSettings(String::from("demand period without a name")))?;
    let time_period = config_utils::yaml_as_string(&yaml["time_period"]).
        ok_or(AssignmentError::InvalidSettings(format!("no time_period for {}", name)))?;
    return Ok(PeriodSettings {name, time_period});
}

fn demand_file_from_yaml(yaml: &Yaml) -> Result<DemandFileSettings, AssignmentError> {
    let file_name = config_utils::yaml_as_string(&yaml["file_name"]).
        ok_or(AssignmentError::InvalidSettings(String::from("demand file without file_name")))?;
    let period = config_utils::yaml_as_string(&yaml["period"]).
        ok_or(AssignmentError::InvalidSettings(format!("no period for {}", file_name)))?;
    let agent_type = config_utils::yaml_as_string(&yaml["agent_type"]).
        ok_or(AssignmentError::InvalidSettings(format!("no agent_type for {}", file_name)))?;
    return Ok(DemandFileSettings {file_name, period, agent_type});
}
