
fn main() {
    if let Err(e) = camlink_lib::run() {
        eprintln!("camlink: {:#}", e);
        std::process::exit(1);
    }
}
