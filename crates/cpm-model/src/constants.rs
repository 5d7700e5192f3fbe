//! Well-known names, paths and encodings

/// Name of the kube-apiserver service and deployment
pub const KUBE_APISERVER: &str = "kube-apiserver";

/// Name of the kube-controller-manager deployment
pub const KUBE_CONTROLLER_MANAGER: &str = "kube-controller-manager";

/// Name of the kube-scheduler deployment
pub const KUBE_SCHEDULER: &str = "kube-scheduler";

/// Name of the cluster-autoscaler deployment
pub const CLUSTER_AUTOSCALER: &str = "cluster-autoscaler";

/// Name of the vpn-seed-server deployment
pub const VPN_SEED_SERVER: &str = "vpn-seed-server";

/// Name of the main etcd instance
pub const ETCD_MAIN: &str = "etcd-main";

/// Name of the events etcd instance
pub const ETCD_EVENTS: &str = "etcd-events";

/// Unit name of the kubelet service
pub const UNIT_NAME_KUBELET_SERVICE: &str = "kubelet.service";

/// Path of the kubelet configuration file
pub const FILE_PATH_KUBELET_CONFIG: &str = "/var/lib/kubelet/config/kubelet";

/// Path of the kernel settings file
pub const FILE_PATH_KERNEL_SETTINGS: &str = "/etc/sysctl.d/99-k8s-general.conf";

/// Path of the kubelet cloud provider config file
pub const FILE_PATH_CLOUD_PROVIDER_CONFIG: &str = "/var/lib/kubelet/cloudprovider.conf";

/// Permissions of the kubelet cloud provider config file
pub const CLOUD_PROVIDER_CONFIG_PERMISSIONS: i32 = 0o644;

/// Label carrying the worker pool an operating system config belongs to
pub const LABEL_WORKER_POOL: &str = "worker.gardener.cloud/pool";

/// Plain inline content encoding
pub const ENCODING_PLAIN: &str = "";

/// Base64 inline content encoding
pub const ENCODING_B64: &str = "b64";

/// Gzip then base64 inline content encoding
pub const ENCODING_GZIP_B64: &str = "gzip+b64";
