fn main() {
    let git_path = std::path::Path::new("../../.git");
    if git_path.exists() {
        println!("cargo:rerun-if-changed=../../.git/HEAD");
    }

    // builds outside of a git checkout fall back to the package version
    let output = std::process::Command::new("git")
        .args(["describe", "--tags", "--always", "--dirty"])
        .output();
    if let Ok(output) = output {
        let version = String::from_utf8_lossy(&output.stdout);
        if output.status.success() && !version.trim().is_empty() {
            println!("cargo:rustc-env=GIT_VERSION={}", version.trim());
        }
    }
}
