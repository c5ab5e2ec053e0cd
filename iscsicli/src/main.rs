use std::env;
use std::path::Path;

use anyhow::Result;
use iscsictl::{Config, Iscsi, Target};

static USAGE: &str = "usage: iscsicli discover <address> [--login]
       iscsicli initiators [file]
       iscsicli login <portal> <iqn>
       iscsicli logout <portal> <iqn>
       iscsicli rescan

set ISCSICLI_CONFIG to a yaml config file to select the backend and its options";

fn main() -> Result<()> {
    env_logger::init();

    let cfg = match env::var("ISCSICLI_CONFIG") {
        Ok(path) => Config::read(path)?,
        Err(_) => Config::default(),
    };
    let iscsi = cfg.build();
    log::debug!("using {} backend", if iscsi.is_mock() { "mock" } else { "iscsiadm" });

    let args = env::args().skip(1).collect::<Vec<String>>();
    let args = args.iter().map(String::as_str).collect::<Vec<&str>>();

    match args.as_slice() {
        ["discover", address] => print(&iscsi.discover_targets(address, false)?)?,
        ["discover", address, "--login"] => print(&iscsi.discover_targets(address, true)?)?,
        ["initiators"] => print(&iscsi.get_initiators(None)?)?,
        ["initiators", file] => print(&iscsi.get_initiators(Some(Path::new(file)))?)?,
        ["login", portal, iqn] => iscsi.perform_login(&Target::new(*portal, "", *iqn))?,
        ["logout", portal, iqn] => iscsi.perform_logout(&Target::new(*portal, "", *iqn))?,
        ["rescan"] => iscsi.perform_rescan()?,
        _ => anyhow::bail!("{}", USAGE),
    }

    Ok(())
}

fn print<T: serde::Serialize>(value: &T) -> Result<()> {
    let s = serde_yml::to_string(value)?;
    print!("{}", s);
    Ok(())
}
