//! Bakes device configuration from `.env` (or the build environment) into
//! the firmware image.

const SETTINGS: [(&str, &str); 6] = [
    ("WIFI_SSID", ""),
    ("WIFI_PASS", ""),
    ("API_HOST", "localhost"),
    ("API_PATH", "/api/readings"),
    ("SITE_REGION", "Ladakh"),
    // Empty disables periodic refresh
    ("REFRESH_SLOT_MINUTES", ""),
];

fn main() {
    println!("cargo:rerun-if-changed=.env");
    if let Err(e) = dotenvy::dotenv() {
        println!("cargo:warning=No .env loaded ({e}), using the build environment");
    }

    for (key, default) in SETTINGS {
        println!("cargo:rerun-if-env-changed={key}");
        let value = std::env::var(key).unwrap_or_else(|_| default.to_string());
        if value.is_empty() && key.starts_with("WIFI_") {
            println!("cargo:warning={key} is not set");
        }
        println!("cargo:rustc-env={key}={value}");
    }

    println!("cargo:rustc-link-arg=-Tlinkall.x");
}
