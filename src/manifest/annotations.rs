//! Annotation keys shared by partial and merged manifests.

/// Prefix of the annotations naming the feature gates a partial belongs to.
pub const FEATURE_GATE_PREFIX: &str = "feature-gate.release.openshift.io/";

/// Records the feature set a merged manifest was generated for.
pub const FEATURE_SET_ANNOTATION: &str = "release.openshift.io/feature-set";

/// Prefix of the annotations selecting the cluster profiles a CRD ships in.
pub const CLUSTER_PROFILE_PREFIX: &str = "include.release.openshift.io/";

/// Output file name template. Never copied to generated manifests.
pub const FILENAME_PATTERN_ANNOTATION: &str = "api.openshift.io/filename-pattern";

/// Token in the filename template replaced by the feature set suffix.
pub const FILENAME_MARKERS: &str = "MARKERS";

/// Annotation keys ending with this suffix remove the unsuffixed key.
pub const DELETE_MARKER_SUFFIX: char = '-';

/// Cluster profiles injected when a CRD declares none.
pub const DEFAULT_CLUSTER_PROFILES: [&str; 3] = [
    "ibm-cloud-managed",
    "self-managed-high-availability",
    "single-node-developer",
];

/// Builds the annotation key that includes a CRD in a cluster profile.
pub fn cluster_profile_annotation(profile: &str) -> String {
    format!("{}{}", CLUSTER_PROFILE_PREFIX, profile)
}
