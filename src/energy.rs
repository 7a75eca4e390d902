use crate::forecast::types::WeatherSeries;
use serde::{Deserialize, Serialize};

/// STC reference irradiance in W/m².
pub const STC_IRRADIANCE: f64 = 1000.0;
/// STC reference cell temperature in °C.
pub const STC_TEMPERATURE: f64 = 25.0;
/// Reference irradiance at which NOCT is specified, in W/m².
const NOCT_IRRADIANCE: f64 = 800.0;
/// Reference ambient temperature at which NOCT is specified, in °C.
const NOCT_AMBIENT: f64 = 20.0;

pub const DEFAULT_MODULE_EFFICIENCY: f64 = 0.18;
pub const DEFAULT_TEMPERATURE_COEFFICIENT: f64 = -0.0035;
pub const DEFAULT_NOCT: f64 = 45.0;
pub const DEFAULT_SYSTEM_LOSSES: f64 = 0.14;

fn default_module_efficiency() -> f64 {
    DEFAULT_MODULE_EFFICIENCY
}

fn default_temperature_coefficient() -> f64 {
    DEFAULT_TEMPERATURE_COEFFICIENT
}

fn default_noct() -> f64 {
    DEFAULT_NOCT
}

fn default_system_losses() -> f64 {
    DEFAULT_SYSTEM_LOSSES
}

/// One panel array. Field names follow the forecast API's request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PvSystemConfig {
    /// Peak power in kWp.
    #[serde(rename = "power")]
    pub power_kw: f64,
    /// Panel tilt, 0 = horizontal.
    #[serde(rename = "inclination")]
    pub inclination_deg: f64,
    /// South = 0, East = -90, West = 90.
    #[serde(rename = "azimuth")]
    pub azimuth_deg: f64,
    #[serde(rename = "system_losses", default = "default_system_losses")]
    pub system_loss_fraction: f64,
    #[serde(rename = "module_efficiency", default = "default_module_efficiency")]
    pub module_efficiency_fraction: f64,
    #[serde(rename = "temperature_coefficient", default = "default_temperature_coefficient")]
    pub temperature_coefficient_per_k: f64,
    #[serde(rename = "noct", default = "default_noct")]
    pub noct_celsius: f64,
}

impl PvSystemConfig {
    /// A system with the given geometry and stock module parameters.
    pub fn new(power_kw: f64, inclination_deg: f64, azimuth_deg: f64) -> Self {
        Self {
            power_kw,
            inclination_deg,
            azimuth_deg,
            system_loss_fraction: DEFAULT_SYSTEM_LOSSES,
            module_efficiency_fraction: DEFAULT_MODULE_EFFICIENCY,
            temperature_coefficient_per_k: DEFAULT_TEMPERATURE_COEFFICIENT,
            noct_celsius: DEFAULT_NOCT,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        let fields = [
            ("power", self.power_kw),
            ("inclination", self.inclination_deg),
            ("azimuth", self.azimuth_deg),
            ("system_losses", self.system_loss_fraction),
            ("module_efficiency", self.module_efficiency_fraction),
            ("temperature_coefficient", self.temperature_coefficient_per_k),
            ("noct", self.noct_celsius),
        ];
        if let Some((name, _)) = fields.iter().find(|(_, v)| !v.is_finite()) {
            return Err(format!("{} must be a finite number", name));
        }

        if self.power_kw <= 0.0 {
            return Err(format!("Invalid power: {}. Must be greater than 0", self.power_kw));
        }
        if !(0.0..=90.0).contains(&self.inclination_deg) {
            return Err(format!(
                "Invalid inclination: {}. Must be between 0 and 90",
                self.inclination_deg
            ));
        }
        if !(-180.0..=180.0).contains(&self.azimuth_deg) {
            return Err(format!(
                "Invalid azimuth: {}. Must be between -180 and 180",
                self.azimuth_deg
            ));
        }
        if !(0.0..=1.0).contains(&self.system_loss_fraction) {
            return Err(format!(
                "Invalid system losses: {}. Must be between 0 and 1",
                self.system_loss_fraction
            ));
        }
        if self.module_efficiency_fraction <= 0.0 || self.module_efficiency_fraction > 1.0 {
            return Err(format!(
                "Invalid module efficiency: {}. Must be above 0 and at most 1",
                self.module_efficiency_fraction
            ));
        }
        Ok(())
    }

    /// Module area implied by rated power at STC efficiency, in m².
    pub fn module_area_m2(&self) -> f64 {
        (self.power_kw * 1000.0) / (self.module_efficiency_fraction * STC_IRRADIANCE)
    }
}

/// Physically parameterized PV yield model.
///
/// Per hour: NOCT cell temperature, temperature-corrected module efficiency,
/// then plane-of-array energy through the module area net of system losses.
/// Daily totals are the aggregator's concern.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergyModel {
    pub stc_temperature_c: f64,
}

impl Default for EnergyModel {
    fn default() -> Self {
        Self {
            stc_temperature_c: STC_TEMPERATURE,
        }
    }
}

impl EnergyModel {
    pub fn new(stc_temperature_c: f64) -> Self {
        Self { stc_temperature_c }
    }

    pub fn cell_temperature(&self, ambient_c: f64, irradiance_wm2: f64, system: &PvSystemConfig) -> f64 {
        ambient_c + ((system.noct_celsius - NOCT_AMBIENT) / NOCT_IRRADIANCE) * irradiance_wm2
    }

    pub fn module_efficiency(&self, cell_temp_c: f64, system: &PvSystemConfig) -> f64 {
        system.module_efficiency_fraction
            * (1.0 + system.temperature_coefficient_per_k * (cell_temp_c - self.stc_temperature_c))
    }

    /// Energy for one one-hour step, in kWh.
    pub fn hour_energy_kwh(&self, irradiance_wm2: f64, ambient_c: f64, system: &PvSystemConfig) -> f64 {
        let cell_temp = self.cell_temperature(ambient_c, irradiance_wm2, system);
        let efficiency = self.module_efficiency(cell_temp, system);
        irradiance_wm2 * system.module_area_m2() * efficiency * (1.0 - system.system_loss_fraction)
            / 1000.0
    }

    /// Hourly energy for one system. The output covers as many hours as both
    /// weather channels provide; the aggregator pads short series with zeros.
    pub fn hourly_energy(&self, weather: &WeatherSeries, system: &PvSystemConfig) -> Vec<f64> {
        weather
            .irradiance_wm2
            .iter()
            .zip(&weather.ambient_temp_c)
            .map(|(&irradiance, &ambient)| self.hour_energy_kwh(irradiance, ambient, system))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_system() -> PvSystemConfig {
        PvSystemConfig {
            power_kw: 5.0,
            inclination_deg: 30.0,
            azimuth_deg: 0.0,
            system_loss_fraction: 0.14,
            module_efficiency_fraction: 0.18,
            temperature_coefficient_per_k: -0.0035,
            noct_celsius: 45.0,
        }
    }

    #[test]
    fn test_reference_hour() {
        let model = EnergyModel::default();
        let system = reference_system();

        let cell = model.cell_temperature(20.0, 800.0, &system);
        assert!((cell - 45.0).abs() < 1e-9);

        let eff = model.module_efficiency(cell, &system);
        assert!((eff - 0.1674).abs() < 1e-9);

        assert!((system.module_area_m2() - 27.7778).abs() < 1e-3);

        let energy = model.hour_energy_kwh(800.0, 20.0, &system);
        assert!((energy - 3.20).abs() < 0.005, "got {}", energy);
    }

    #[test]
    fn test_zero_irradiance_yields_exactly_zero() {
        let model = EnergyModel::default();
        let weather = WeatherSeries {
            irradiance_wm2: vec![0.0; 24],
            ambient_temp_c: (0..24).map(|h| -10.0 + h as f64).collect(),
        };

        let energy = model.hourly_energy(&weather, &reference_system());

        assert_eq!(energy.len(), 24);
        assert!(energy.iter().all(|&e| e == 0.0));
    }

    #[test]
    fn test_implausible_inputs_are_computed_not_rejected() {
        let model = EnergyModel::default();
        let weather = WeatherSeries {
            irradiance_wm2: vec![-50.0, 5000.0],
            ambient_temp_c: vec![-80.0, 90.0],
        };

        let energy = model.hourly_energy(&weather, &reference_system());

        assert_eq!(energy.len(), 2);
        assert!(energy[0] < 0.0);
        assert!(energy.iter().all(|e| e.is_finite()));
    }

    #[test]
    fn test_output_follows_shorter_channel() {
        let model = EnergyModel::default();
        let weather = WeatherSeries {
            irradiance_wm2: vec![500.0; 10],
            ambient_temp_c: vec![15.0; 4],
        };
        assert_eq!(model.hourly_energy(&weather, &reference_system()).len(), 4);
    }

    #[test]
    fn test_hotter_cells_produce_less() {
        let model = EnergyModel::default();
        let system = reference_system();
        let cool = model.hour_energy_kwh(800.0, 5.0, &system);
        let hot = model.hour_energy_kwh(800.0, 35.0, &system);
        assert!(hot < cool);
    }

    #[test]
    fn test_stc_temperature_shifts_correction() {
        let system = reference_system();
        let standard = EnergyModel::default().hour_energy_kwh(800.0, 20.0, &system);
        let warmer_ref = EnergyModel::new(45.0).hour_energy_kwh(800.0, 20.0, &system);
        // At a 45 °C reference the 45 °C cell needs no correction.
        let uncorrected = 800.0 * system.module_area_m2() * 0.18 * 0.86 / 1000.0;
        assert!((warmer_ref - uncorrected).abs() < 1e-9);
        assert!(warmer_ref > standard);
    }

    #[test]
    fn test_validation_bounds() {
        assert!(reference_system().validate().is_ok());

        let mut bad = reference_system();
        bad.power_kw = 0.0;
        assert!(bad.validate().is_err());

        let mut bad = reference_system();
        bad.inclination_deg = 91.0;
        assert!(bad.validate().is_err());

        let mut bad = reference_system();
        bad.azimuth_deg = -181.0;
        assert!(bad.validate().is_err());

        let mut bad = reference_system();
        bad.module_efficiency_fraction = 0.0;
        assert!(bad.validate().is_err());

        let mut bad = reference_system();
        bad.system_loss_fraction = 1.01;
        assert!(bad.validate().is_err());

        let mut bad = reference_system();
        bad.system_loss_fraction = f64::NAN;
        assert!(bad.validate().unwrap_err().contains("system_losses"));
    }

    #[test]
    fn test_total_losses_are_valid_and_produce_nothing() {
        let system = PvSystemConfig {
            system_loss_fraction: 1.0,
            ..reference_system()
        };
        assert!(system.validate().is_ok());
        assert_eq!(EnergyModel::default().hour_energy_kwh(800.0, 20.0, &system), 0.0);
    }

    #[test]
    fn test_request_defaults_fill_module_parameters() {
        let system: PvSystemConfig =
            serde_json::from_str(r#"{"power": 4.2, "inclination": 35, "azimuth": -20}"#).unwrap();
        assert_eq!(system, PvSystemConfig {
            power_kw: 4.2,
            inclination_deg: 35.0,
            azimuth_deg: -20.0,
            ..PvSystemConfig::new(0.0, 0.0, 0.0)
        });
    }
}
