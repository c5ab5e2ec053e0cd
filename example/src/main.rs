use anyhow::Result;
use iscsictl::{
    induce_error, new_iscsi, reset_induced_errors, Config, Iscsi, Operation, Options,
    MOCK_NUMBER_OF_INITIATORS, MOCK_NUMBER_OF_TARGETS,
};

fn main() -> Result<()> {
    let mut options = Options::new();
    options.insert(MOCK_NUMBER_OF_TARGETS, "3");
    options.insert(MOCK_NUMBER_OF_INITIATORS, "2");

    let iscsi = new_iscsi(true, options.clone());

    let targets = iscsi.discover_targets("10.247.73.130", true)?;
    let s = serde_yml::to_string(&targets)?;
    println!("{}", s);

    let initiators = iscsi.get_initiators(None)?;
    let s = serde_yml::to_string(&initiators)?;
    println!("initiators: {}", s);

    for target in &targets {
        iscsi.perform_login(target)?;
    }
    iscsi.perform_rescan()?;

    induce_error(Operation::Logout, true);
    if let Some(target) = targets.first() {
        if let Err(e) = iscsi.perform_logout(target) {
            println!("logout: {}", e);
        }
    }
    reset_induced_errors();

    let cfg = Config::new(true, &options);
    cfg.write_to("/tmp/iscsictl.yml")?;

    let cfg = Config::read("/tmp/iscsictl.yml")?;
    let iscsi = cfg.build();
    println!("{} targets from config", iscsi.discover_targets("10.247.73.130", false)?.len());

    Ok(())
}
