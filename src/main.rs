use log::error;

fn main() {
    env_logger::init();

    if let Err(e) = ais_crossing::get_arg().and_then(ais_crossing::run) {
        error!("{e:#}");
        std::process::exit(-1);
    }
}
