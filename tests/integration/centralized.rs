mod keys {

  centralized_test!(keys, should_set_and_get_a_value);
  centralized_test!(keys, should_set_and_del_a_value);
  centralized_test!(keys, should_incr_and_decr_a_value);
  centralized_test!(keys, should_mset_and_mget_values);
  centralized_test_panic!(keys, should_error_mset_empty_map);
  centralized_test!(keys, should_msetnx_values);
  centralized_test!(keys, should_count_keys_across_slots);
  centralized_test!(keys, should_expire_and_persist_key);
  centralized_test!(keys, should_rename_key_with_ttl);
  centralized_test_panic!(keys, should_error_rename_missing_key);
  centralized_test!(keys, should_not_renamenx_over_existing_key);
  centralized_test!(keys, should_dump_and_restore_key);
  centralized_test!(keys, should_modify_ranges);
  centralized_test!(keys, should_getset_and_getdel_values);
}

mod hashes {

  centralized_test!(hashes, should_hset_and_hget);
  centralized_test!(hashes, should_hset_and_hdel);
  centralized_test!(hashes, should_hgetall);
  centralized_test!(hashes, should_increment_fields);
  centralized_test!(hashes, should_get_keys_values_and_lengths);
}

mod lists {

  centralized_test!(lists, should_push_and_pop_values);
  centralized_test!(lists, should_insert_and_remove_values);
  centralized_test!(lists, should_move_between_lists);
  centralized_test!(lists, should_time_out_blocking_pop);
  centralized_test!(lists, should_blpop_pushed_value);
}

mod sets {

  centralized_test!(sets, should_sadd_and_srem_elements);
  centralized_test!(sets, should_pop_and_read_random_members);
  centralized_test!(sets, should_combine_sets);
  centralized_test!(sets, should_store_combined_sets);
  centralized_test!(sets, should_smove_members);
}

mod sorted_sets {

  centralized_test!(sorted_sets, should_add_and_read_members);
  centralized_test!(sorted_sets, should_add_with_options);
  centralized_test!(sorted_sets, should_store_union_in_one_slot);
}

mod lua {

  centralized_test!(lua, should_load_script);
  centralized_test!(lua, should_evalsha_echo_script);
  centralized_test!(lua, should_eval_echo_script);
  centralized_test_panic!(lua, should_error_evalsha_missing_script);
}

mod multi {

  centralized_test!(multi, should_run_get_set_trx);
  centralized_test_panic!(multi, should_run_error_get_set_trx);
  centralized_test!(multi, should_ignore_nested_multi);
  centralized_test!(multi, should_abort_when_watched_key_changes);
  centralized_test!(multi, should_run_after_unwatch);
  centralized_test!(multi, should_discard_trx);
}

mod pipeline {

  centralized_test!(pipeline, should_return_results_in_order);
  centralized_test!(pipeline, should_map_queued_values_to_none);
  centralized_test!(pipeline, should_carry_partial_results_on_failure);
  centralized_test!(pipeline, should_close_without_open_pipeline);
  centralized_test_panic!(pipeline, should_error_multi_during_pipeline);
}

mod pool {

  centralized_test!(pool, should_fail_when_pool_exhausted);
  centralized_test!(pool, should_reuse_released_connections);
  centralized_test!(pool, should_close_pooled_connections_on_destroy);
  centralized_test!(pool, should_block_dedicated_connection_per_handle);
}

mod pubsub {

  centralized_test!(pubsub, should_publish_and_recv_messages);
  centralized_test!(pubsub, should_psubscribe_and_recv_messages);
  centralized_test!(pubsub, should_track_channels_and_patterns);
}

mod server {

  centralized_test!(server, should_ping_and_echo);
  centralized_test!(server, should_flushall_and_count_keys);
  centralized_test!(server, should_read_time_and_lastsave);
  centralized_test!(server, should_set_and_get_client_name);
  centralized_test!(server, should_set_and_get_config);
  centralized_test!(server, should_read_info);
}

mod scanning {

  centralized_test!(scanning, should_scan_keys_by_page);
  centralized_test!(scanning, should_scan_hash_set_and_sorted_set_pages);
  centralized_test!(scanning, should_scan_every_key_with_a_stream);
  centralized_test!(scanning, should_stream_value_scans);
  centralized_test_panic!(scanning, should_error_scan_during_pipeline);
}
