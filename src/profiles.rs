// src/profiles.rs

//! Device models as data: phase timing plus the quantities each reports.

use crate::common::{ConfigError, MAX_QUANTITIES};
use crate::lifecycle::{SensorConfig, TimingProfile};
use crate::variable::{QuantitySpec, Variable};
use core::fmt;

/// Timing and quantity layout of one device model.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DeviceProfile {
    pub name: &'static str,
    pub timing: TimingProfile,
    pub quantities: &'static [QuantitySpec],
}

impl DeviceProfile {
    pub fn quantity_count(&self) -> usize {
        self.quantities.len()
    }

    /// Checks indices are in range and unique, and resolutions are supported.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let count = self.quantities.len();
        if count > MAX_QUANTITIES {
            return Err(ConfigError::TooManyQuantities { count, max: MAX_QUANTITIES });
        }
        let mut seen: u16 = 0;
        for spec in self.quantities {
            spec.validate()?;
            if usize::from(spec.index) >= count {
                return Err(ConfigError::QuantityIndexOutOfRange { index: spec.index, count });
            }
            let bit = 1u16 << spec.index;
            if seen & bit != 0 {
                return Err(ConfigError::DuplicateQuantityIndex(spec.index));
            }
            seen |= bit;
        }
        Ok(())
    }

    /// Sensor configuration with this model's timing and quantity count.
    pub fn sensor_config(&self) -> Result<SensorConfig, ConfigError> {
        self.validate()?;
        Ok(SensorConfig::new(self.name, self.quantity_count(), self.timing))
    }

    pub fn spec(&self, code: &str) -> Option<&QuantitySpec> {
        self.quantities.iter().find(|spec| spec.code == code)
    }

    /// Unbound variable for the quantity in slot `index`.
    pub fn variable(&self, index: u8, uuid: Option<&'static str>) -> Result<Variable, ConfigError> {
        let spec = self
            .quantities
            .iter()
            .find(|spec| spec.index == index)
            .ok_or(ConfigError::QuantityIndexOutOfRange { index, count: self.quantity_count() })?;
        Variable::new(*spec, uuid)
    }
}

const fn q(index: u8, name: &'static str, unit: &'static str, resolution: u8, code: &'static str) -> QuantitySpec {
    QuantitySpec::new(index, name, unit, resolution, code)
}

// --- AOSong single-wire ---

pub const DHT: DeviceProfile = DeviceProfile {
    name: "AOSongDHT",
    timing: TimingProfile::from_millis(1700, 0, 2000),
    quantities: &[
        q(0, "relativeHumidity", "percent", 1, "DHTHumidity"),
        q(1, "temperature", "degreeCelsius", 1, "DHTTemp"),
        q(2, "heatIndex", "degreeCelsius", 1, "DHTHI"),
    ],
};

pub const AM2315: DeviceProfile = DeviceProfile {
    name: "AOSongAM2315",
    timing: TimingProfile::from_millis(500, 500, 2000),
    quantities: &[
        q(0, "relativeHumidity", "percent", 1, "AM2315Humidity"),
        q(1, "temperature", "degreeCelsius", 1, "AM2315Temp"),
    ],
};

/// DHT family members. Several vendor names share one type code.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DhtModel {
    Dht11,
    Dht21,
    Am2301,
    Dht22,
    Am2302,
}

/// Names that resolve to the same type code. Kept as distinct models; whether
/// they are interchangeable hardware revisions is not established.
pub const DHT_EQUIVALENCES: &[(DhtModel, DhtModel)] =
    &[(DhtModel::Dht21, DhtModel::Am2301), (DhtModel::Dht22, DhtModel::Am2302)];

impl DhtModel {
    pub const fn type_code(&self) -> u8 {
        match self {
            DhtModel::Dht11 => 11,
            DhtModel::Dht21 | DhtModel::Am2301 => 21,
            DhtModel::Dht22 | DhtModel::Am2302 => 22,
        }
    }

    /// `true` if `self` and `other` are the same model or listed in [`DHT_EQUIVALENCES`].
    pub fn is_equivalent(&self, other: DhtModel) -> bool {
        *self == other
            || DHT_EQUIVALENCES
                .iter()
                .any(|&(a, b)| (a, b) == (*self, other) || (b, a) == (*self, other))
    }
}

impl fmt::Display for DhtModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DhtModel::Dht11 => "DHT11",
            DhtModel::Dht21 => "DHT21",
            DhtModel::Am2301 => "AM2301",
            DhtModel::Dht22 => "DHT22",
            DhtModel::Am2302 => "AM2302",
        };
        f.write_str(name)
    }
}

// --- SDI-12 ---

pub const DECAGON_5TM: DeviceProfile = DeviceProfile {
    name: "Decagon5TM",
    timing: TimingProfile::from_millis(200, 0, 200),
    quantities: &[
        q(0, "permittivity", "faradPerMeter", 5, "SoilEa"),
        q(1, "temperature", "degreeCelsius", 2, "SoilTemp"),
        q(2, "volumetricWaterContent", "percent", 3, "SoilVWC"),
    ],
};

pub const DECAGON_CTD: DeviceProfile = DeviceProfile {
    name: "DecagonCTD",
    timing: TimingProfile::from_millis(500, 0, 500),
    quantities: &[
        q(0, "waterDepth", "millimeter", 1, "CTDdepth"),
        q(1, "temperature", "degreeCelsius", 2, "CTDtemp"),
        q(2, "specificConductance", "microsiemenPerCentimeter", 1, "CTDcond"),
    ],
};

pub const METER_TEROS11: DeviceProfile = DeviceProfile {
    name: "MeterTeros11",
    timing: TimingProfile::from_millis(250, 50, 50),
    quantities: &[
        q(0, "permittivity", "faradPerMeter", 5, "SoilEa"),
        q(1, "temperature", "degreeCelsius", 2, "SoilTemp"),
        q(2, "volumetricWaterContent", "percent", 3, "SoilVWC"),
    ],
};

// --- Modbus-RTU ---

pub const KELLER_ACCULEVEL: DeviceProfile = DeviceProfile {
    name: "KellerAcculevel",
    timing: TimingProfile::from_millis(500, 5000, 1500),
    quantities: &[
        q(0, "pressureGauge", "millibar", 5, "kellerAccuPress"),
        q(1, "temperature", "degreeCelsius", 2, "kellerAccuTemp"),
        q(2, "gaugeHeight", "meter", 4, "kellerAccuHeight"),
    ],
};

pub const KELLER_NANOLEVEL: DeviceProfile = DeviceProfile {
    name: "KellerNanolevel",
    timing: TimingProfile::from_millis(500, 5000, 1500),
    quantities: &[
        q(0, "pressureGauge", "millibar", 5, "kellerNanoPress"),
        q(1, "temperature", "degreeCelsius", 2, "kellerNanoTemp"),
        q(2, "gaugeHeight", "meter", 4, "kellerNanoHeight"),
    ],
};

pub const YOSEMITECH_Y504: DeviceProfile = DeviceProfile {
    name: "YosemitechY504",
    timing: TimingProfile::from_millis(375, 8000, 1700),
    quantities: &[
        q(0, "oxygenDissolvedPercentOfSaturation", "percent", 1, "Y504DOpct"),
        q(1, "temperature", "degreeCelsius", 1, "Y504Temp"),
        q(2, "oxygenDissolved", "milligramPerLiter", 2, "Y504DOmgL"),
    ],
};

pub const YOSEMITECH_Y510: DeviceProfile = DeviceProfile {
    name: "YosemitechY510",
    timing: TimingProfile::from_millis(500, 22000, 1700),
    quantities: &[
        q(0, "turbidity", "nephelometricTurbidityUnit", 2, "Y510Turbidity"),
        q(1, "temperature", "degreeCelsius", 1, "Y510Temp"),
    ],
};

pub const YOSEMITECH_Y4000: DeviceProfile = DeviceProfile {
    name: "YosemitechY4000",
    timing: TimingProfile::from_millis(1600, 60000, 3000),
    quantities: &[
        q(0, "oxygenDissolved", "milligramPerLiter", 2, "Y4000DOmgL"),
        q(1, "turbidity", "nephelometricTurbidityUnit", 2, "Y4000Turbidity"),
        q(2, "specificConductance", "microsiemenPerCentimeter", 1, "Y4000Cond"),
        q(3, "pH", "pH", 2, "Y4000pH"),
        q(4, "temperature", "degreeCelsius", 1, "Y4000Temp"),
        q(5, "ORP", "millivolt", 0, "Y4000Potential"),
        q(6, "chlorophyllFluorescence", "microgramPerLiter", 1, "Y4000Chloro"),
        q(7, "blueGreenAlgaeCyanobacteriaPhycocyanin", "microgramPerLiter", 2, "Y4000BGA"),
    ],
};

// --- Maxim one-wire ---

pub const MAXIM_DS18: DeviceProfile = DeviceProfile {
    name: "MaximDS18",
    timing: TimingProfile::from_millis(2, 0, 750),
    quantities: &[q(0, "temperature", "degreeCelsius", 4, "DS18Temp")],
};

pub const CATALOG: &[DeviceProfile] = &[
    DHT,
    AM2315,
    DECAGON_5TM,
    DECAGON_CTD,
    METER_TEROS11,
    KELLER_ACCULEVEL,
    KELLER_NANOLEVEL,
    YOSEMITECH_Y504,
    YOSEMITECH_Y510,
    YOSEMITECH_Y4000,
    MAXIM_DS18,
];
