//! Prints the CRD manifests for the fleet importer to stdout.

use kube::CustomResourceExt;

fn main() -> Result<(), serde_yaml::Error> {
    print!("{}", serde_yaml::to_string(&crds::ManagedClusterIntent::crd())?);
    println!("---");
    print!("{}", serde_yaml::to_string(&crds::FleetAgent::crd())?);
    Ok(())
}
