/// Aggregate stationary battery shared by both controller variants.
///
/// `Battery` is pure data plus the lossy state update used when a
/// controller realises a dispatch decision. Each controller instance owns its
/// own copy so two controllers never observe each other's SOC.
///
/// # Power Convention
/// - Positive power: Discharging (supplying the building, less grid import)
/// - Negative power: Charging (extra load drawn from the grid)
///
/// Stored energy (`soc_kwh`) is always kept inside
/// `[soc_min * capacity_kwh, soc_max * capacity_kwh]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Battery {
    /// Usable aggregate capacity in kilowatt-hours.
    pub capacity_kwh: f64,

    /// Lower SOC bound as a fraction of capacity.
    pub soc_min: f64,

    /// Upper SOC bound as a fraction of capacity.
    pub soc_max: f64,

    /// Charge and discharge power limit in kilowatts.
    pub max_power_kw: f64,

    /// Charging efficiency (0..1.0].
    pub eta_charge: f64,

    /// Discharging efficiency (0..1.0].
    pub eta_discharge: f64,

    /// Stored energy in kilowatt-hours.
    soc_kwh: f64,
}

impl Battery {
    /// Creates a new battery with the specified parameters.
    ///
    /// # Arguments
    ///
    /// * `capacity_kwh` - Usable capacity in kWh (must be > 0)
    /// * `initial_soc` - Initial state of charge as a fraction of capacity
    /// * `soc_min` - Minimum state of charge fraction
    /// * `soc_max` - Maximum state of charge fraction
    /// * `max_power_kw` - Charge/discharge power limit in kW
    /// * `eta_charge` - Charging efficiency (0..1.0]
    /// * `eta_discharge` - Discharging efficiency (0..1.0]
    ///
    /// # Panics
    ///
    /// Panics if capacity is zero/negative, SOC bounds are inverted or outside
    /// `[0, 1]`, the initial SOC is outside the bounds, power is not positive, or
    /// efficiencies are invalid.
    pub fn new(
        capacity_kwh: f64,
        initial_soc: f64,
        soc_min: f64,
        soc_max: f64,
        max_power_kw: f64,
        eta_charge: f64,
        eta_discharge: f64,
    ) -> Self {
        assert!(capacity_kwh > 0.0);
        assert!(0.0 <= soc_min && soc_min <= soc_max && soc_max <= 1.0);
        assert!((soc_min..=soc_max).contains(&initial_soc));
        assert!(max_power_kw > 0.0);
        assert!(eta_charge > 0.0 && eta_charge <= 1.0);
        assert!(eta_discharge > 0.0 && eta_discharge <= 1.0);

        Self {
            capacity_kwh,
            soc_min,
            soc_max,
            max_power_kw,
            eta_charge,
            eta_discharge,
            soc_kwh: initial_soc * capacity_kwh,
        }
    }

    /// Stored energy in kWh.
    pub fn soc_kwh(&self) -> f64 {
        self.soc_kwh
    }

    /// Stored energy as a fraction of capacity.
    pub fn soc_fraction(&self) -> f64 {
        self.soc_kwh / self.capacity_kwh
    }

    /// Lowest permitted stored energy in kWh.
    pub fn min_energy_kwh(&self) -> f64 {
        self.soc_min * self.capacity_kwh
    }

    /// Highest permitted stored energy in kWh.
    pub fn max_energy_kwh(&self) -> f64 {
        self.soc_max * self.capacity_kwh
    }

    /// Overwrites the stored energy with a value produced by a planner.
    ///
    /// Solver output can sit a hair outside the box, so the value is clamped.
    pub(crate) fn set_soc_kwh(&mut self, soc_kwh: f64) {
        self.soc_kwh = soc_kwh.clamp(self.min_energy_kwh(), self.max_energy_kwh());
    }

    /// Applies a net power for `dt_hours` with asymmetric efficiency losses.
    ///
    /// Discharge draws `power / eta_discharge` from storage, charge stores
    /// `|power| * eta_charge`. The result saturates at the SOC bounds.
    ///
    /// # Returns
    ///
    /// The stored energy after the update, in kWh.
    pub fn apply_power_kw(&mut self, power_kw: f64, dt_hours: f64) -> f64 {
        self.soc_kwh = if power_kw >= 0.0 {
            (self.soc_kwh - power_kw * dt_hours / self.eta_discharge).max(self.min_energy_kwh())
        } else {
            (self.soc_kwh - power_kw * dt_hours * self.eta_charge).min(self.max_energy_kwh())
        };
        self.soc_kwh
    }
}
