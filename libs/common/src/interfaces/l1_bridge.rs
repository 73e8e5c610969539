use alloy_sol_types::sol;

/// Deployed L1 standard bridge on Ethereum Sepolia.
pub const BRIDGE_CONTRACT_ADDRESS: &str = "0xE3B8f495De4e43C7C911343A53bb19Fc3e3B2783";

/// Minimum gas allowance forwarded to the destination chain when the caller
/// does not override it.
pub const DEFAULT_MIN_GAS_LIMIT: u32 = 20_000;

sol! {
    interface IL1StandardBridge {
        function depositERC20(address l1Token, address l2Token, uint256 amount, uint32 minGasLimit) external;

        function depositETH(uint32 minGasLimit) external payable;

        function depositETHTo(address to, uint32 minGasLimit) external payable;

        #[derive(Debug, PartialEq, Eq)]
        event ERC20Deposited(address indexed l1Token, address indexed l2Token, address indexed to, uint256 amount);

        #[derive(Debug, PartialEq, Eq)]
        event EthDeposited(address indexed from, address indexed to, uint256 amount);
    }
}
