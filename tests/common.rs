use std::{env, path::{Path, PathBuf}, sync::Once};

static START: Once = Once::new();

/// Set cwd to tests directory to be able to load the fixture policies
///
/// The tests directory provides a couple of policy sets and an rbaccat.yml
pub fn setup() {
    START.call_once(|| {
        let pth = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests");
        // loggerv::Logger::new()
        //    .verbosity(3)
        //    .module_path(true)
        //    .line_numbers(true)
        //    .init()
        //    .unwrap();
        println!("Initializing tests - using testdir {}", pth.display());
        assert!(env::set_current_dir(pth).is_ok());
    });
}

/// Fixture policy directory (relative to the tests directory)
#[allow(dead_code)]
pub fn fixture(name: &str) -> Vec<PathBuf> {
    vec![PathBuf::from(name)]
}
