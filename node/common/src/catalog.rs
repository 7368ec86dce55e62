/// On-demand hourly prices for GPU instance types (Linux, us-east-1)
const ON_DEMAND: &[(&str, f64)] = &[
    ("p2.xlarge", 0.90),
    ("p2.8xlarge", 7.20),
    ("p2.16xlarge", 14.40),
    ("p3.2xlarge", 3.06),
    ("p3.8xlarge", 12.24),
    ("p3.16xlarge", 24.48),
    ("g3.4xlarge", 1.14),
    ("g3.8xlarge", 2.28),
    ("g3.16xlarge", 4.56),
    ("g4dn.xlarge", 0.526),
    ("g5.xlarge", 1.006),
];

pub fn on_demand_price(instance_type: &str) -> Option<f64> {
    ON_DEMAND
        .iter()
        .find(|(name, _)| *name == instance_type)
        .map(|(_, price)| *price)
}

pub fn is_supported(instance_type: &str) -> bool {
    on_demand_price(instance_type).is_some()
}
