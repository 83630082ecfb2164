use rand::Rng;

pub fn generate_session_id() -> String {
    let mut rng = rand::rng();
    let value: u128 = rng.random();
    let hex = format!("{:032x}", value);
    format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}
